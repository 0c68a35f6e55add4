//! App bundle metadata: Info.plist, .jpackage.xml and the ICNS icon.

use crate::bundler::{
    builder::PackagingContext,
    error::{Error, ErrorExt, Result},
    icon,
    settings::Application,
    toolchain::{CommandRunner, ContainerRunner, quote},
};
use handlebars::Handlebars;
use regex::{NoExpand, Regex};
use serde::Serialize;
use std::path::Path;

const INFO_PLIST_TEMPLATE: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "https://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
 <dict>
  <key>LSMinimumSystemVersion</key>
  <string>10.9</string>
  <key>CFBundleDevelopmentRegion</key>
  <string>English</string>
  <key>CFBundleAllowMixedLocalizations</key>
  <true/>
  <key>CFBundleExecutable</key>
  <string>{{name}}</string>
  <key>CFBundleIconFile</key>
  <string>{{icon_file}}</string>
  <key>CFBundleIdentifier</key>
  <string>{{identifier}}</string>
  <key>CFBundleInfoDictionaryVersion</key>
  <string>6.0</string>
  <key>CFBundleName</key>
  <string>{{name}}</string>
  <key>CFBundlePackageType</key>
  <string>APPL</string>
  <key>CFBundleShortVersionString</key>
  <string>{{version}}</string>
  <key>CFBundleSignature</key>
  <string>????</string>
  <key>LSApplicationCategoryType</key>
  <string>Unknown</string>
  <key>CFBundleVersion</key>
  <string>{{version}}</string>
  <key>NSHumanReadableCopyright</key>
  <string>Copyright © {{year}}</string>
  <key>NSHighResolutionCapable</key>
  <string>true</string>
 </dict>
</plist>
"#;

#[derive(Serialize)]
struct PlistData<'a> {
    name: &'a str,
    version: &'a str,
    identifier: String,
    icon_file: String,
    year: i32,
}

fn plist_data(app: &Application) -> PlistData<'_> {
    use chrono::Datelike;
    PlistData {
        name: app.name(),
        version: app.version(),
        identifier: bundle_identifier(app.name()),
        icon_file: format!("{}.icns", app.name()),
        year: chrono::Local::now().year(),
    }
}

/// `com.<lowercased name>.<name>`
pub fn bundle_identifier(name: &str) -> String {
    format!("com.{}.{}", name.to_lowercase(), name)
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Replaces the `<string>` value following `<key>{key}</key>`.
///
/// Keys absent from `plist` are left alone.
pub fn set_plist_string(plist: &str, key: &str, value: &str) -> Result<String> {
    let pattern = Regex::new(&format!(
        r"<key>{}</key>\s*<string>.*?</string>",
        regex::escape(key)
    ))?;
    let replacement = format!(
        "<key>{}</key>\n  <string>{}</string>",
        key,
        xml_escape(value)
    );
    Ok(pattern
        .replace_all(plist, NoExpand(&replacement))
        .into_owned())
}

/// Rewrites the identifying keys of an existing Info.plist.
pub fn update_plist(plist: &str, app: &Application) -> Result<String> {
    let data = plist_data(app);
    let mut plist = plist.to_string();
    for (key, value) in [
        ("CFBundleExecutable", data.name),
        ("CFBundleName", data.name),
        ("CFBundleIdentifier", data.identifier.as_str()),
        ("CFBundleIconFile", data.icon_file.as_str()),
        ("CFBundleShortVersionString", data.version),
        ("CFBundleVersion", data.version),
    ] {
        plist = set_plist_string(&plist, key, value)?;
    }
    Ok(plist)
}

/// Renders a complete Info.plist.
pub fn render_plist(app: &Application) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_template_string("info.plist", INFO_PLIST_TEMPLATE)?;
    Ok(handlebars.render("info.plist", &plist_data(app))?)
}

/// Updates `app-version` and `main-launcher`, or renders a fresh state file.
pub fn update_jpackage_xml(existing: Option<&str>, app: &Application) -> Result<String> {
    let version = xml_escape(app.version());
    let launcher = xml_escape(app.name());
    match existing {
        Some(xml) => {
            let xml = Regex::new(r"<app-version>.*?</app-version>")?.replace_all(
                xml,
                NoExpand(&format!("<app-version>{}</app-version>", version)),
            );
            let xml = Regex::new(r"<main-launcher>.*?</main-launcher>")?.replace_all(
                &xml,
                NoExpand(&format!("<main-launcher>{}</main-launcher>", launcher)),
            );
            Ok(xml.into_owned())
        }
        None => Ok(format!(
            "<?xml version=\"1.0\" ?>\n\
             <jpackage-state version=\"15.0.1\" platform=\"macOS\">\n  \
             <app-version>{}</app-version>\n  \
             <main-launcher>{}</main-launcher>\n\
             </jpackage-state>\n",
            version, launcher
        )),
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(Error::Fs {
            context: "reading bundle metadata",
            path: path.to_path_buf(),
            error,
        }),
    }
}

/// Writes the bundle metadata and icon into `bundle`.
pub async fn update_bundle<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    bundle: &Path,
    app: &Application,
) -> Result<()> {
    let contents = bundle.join("Contents");

    let plist_path = contents.join("Info.plist");
    let plist = match read_optional(&plist_path).await? {
        Some(existing) => update_plist(&existing, app)?,
        None => {
            log::debug!("No Info.plist in bundle, creating one");
            render_plist(app)?
        }
    };
    tokio::fs::write(&plist_path, plist)
        .await
        .fs_context("writing Info.plist", &plist_path)?;

    let state_path = contents.join("app/.jpackage.xml");
    let state = update_jpackage_xml(read_optional(&state_path).await?.as_deref(), app)?;
    tokio::fs::write(&state_path, state)
        .await
        .fs_context("writing .jpackage.xml", &state_path)?;

    let resources = contents.join("Resources");
    tokio::fs::create_dir_all(&resources)
        .await
        .fs_context("creating Resources directory", &resources)?;
    let png = icon::standardize(ctx, app.icons().app.as_deref(), app.name(), "app").await?;
    if let Err(e) = convert_icns(ctx, &png, &resources, app.name()).await {
        log::warn!("Could not create ICNS icon: {}", e);
    }

    Ok(())
}

async fn convert_icns<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    png: &Path,
    resources: &Path,
    name: &str,
) -> Result<()> {
    let runner = ctx.container_runner("kpacker-icns-", "-work")?;
    let result = convert_icns_in(ctx, &runner, png, resources, name).await;
    runner.dispose();
    result
}

async fn convert_icns_in<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    png: &Path,
    resources: &Path,
    name: &str,
) -> Result<()> {
    let staged = "icon.png";
    let icns = format!("{}.icns", name);
    tokio::fs::copy(png, runner.workdir().join(staged))
        .await
        .fs_context("staging icon", png)?;

    let command = format!("iconconvert {} {}", staged, quote(&icns));
    ctx.require(&runner.invoke(&command), "ICNS conversion").await?;

    let produced = runner.workdir().join(&icns);
    if !produced.is_file() {
        return Err(Error::GenericError(format!(
            "ICNS conversion produced no {}",
            icns
        )));
    }
    let target = resources.join(&icns);
    tokio::fs::copy(&produced, &target)
        .await
        .fs_context("copying ICNS icon", &target)?;
    log::debug!("✓ Created {}", target.display());
    Ok(())
}
