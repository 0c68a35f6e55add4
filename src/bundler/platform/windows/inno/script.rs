//! Inno Setup script generation.
//!
//! Generates the installer script from the handlebars template in
//! `template`, filling in metadata, icons and file associations.

use super::template::ISS_TEMPLATE;
use crate::bundler::{error::Result, settings::Application};
use handlebars::Handlebars;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
struct ScriptData<'a> {
    name: &'a str,
    version: &'a str,
    app_id: String,
    install_icon: bool,
    document_icon: bool,
    associations: bool,
    extensions: &'a [String],
    document_name: String,
}

/// Stable installer identity derived from the application name.
///
/// Reinstalling a newer version upgrades in place because the id only
/// depends on the name.
pub fn app_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
        .hyphenated()
        .to_string()
        .to_uppercase()
}

/// Render the installer script.
///
/// `install_icon` and `document_icon` tell whether `install.ico` and
/// `document.ico` were produced next to the script.
pub fn render(app: &Application, install_icon: bool, document_icon: bool) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_template_string("installer.iss", ISS_TEMPLATE)?;

    let extensions = app.document_extensions();
    let data = ScriptData {
        name: app.name(),
        version: app.version(),
        // `{{` is a literal brace in Inno Setup
        app_id: format!("{{{{{}}}", app_id(app.name())),
        install_icon,
        document_icon: document_icon && !extensions.is_empty(),
        associations: !extensions.is_empty(),
        extensions,
        document_name: app.document_name(),
    };

    Ok(handlebars.render("installer.iss", &data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_is_stable() {
        assert_eq!(app_id("Demo"), app_id("Demo"));
        assert_ne!(app_id("Demo"), app_id("demo"));
        let id = app_id("Demo");
        assert_eq!(id.len(), 36);
        assert_eq!(id, id.to_uppercase());
    }

    #[test]
    fn test_template_registers() {
        let mut handlebars = Handlebars::new();
        assert!(
            handlebars
                .register_template_string("installer.iss", ISS_TEMPLATE)
                .is_ok()
        );
    }
}
