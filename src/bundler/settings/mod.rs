//! Packaging inputs.
//!
//! The [`Application`] descriptor and the manifest reader it depends on.

mod application;
mod manifest;

pub use application::{
    Application, ApplicationBuilder, DEFAULT_VERSION, DmgSettings, IconInputs, MAIN_CLASS_KEY,
    SigningSettings,
};
pub use manifest::Manifest;
