//! Windows packaging.

pub mod inno;
