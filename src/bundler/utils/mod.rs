//! Shared filesystem, archive and download helpers.

pub mod archive;
pub mod fs;
pub mod http;
