//! Icon standardization.
//!
//! Every icon slot is turned into a 512x512 PNG with a transparent
//! background before platform specific embedding. Inputs are only shrunk to
//! fit, then centered on the canvas.

use crate::bundler::builder::PackagingContext;
use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::settings::Application;
use crate::bundler::toolchain::{CommandRunner, ContainerRunner, quote};
use crate::bundler::utils::http::{DEFAULT_ICON_URL, cached_download};
use std::path::{Path, PathBuf};

/// Side length of a standardized icon.
pub const ICON_SIZE: u32 = 512;

const SUPPORTED_FORMATS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif", "svg", "pdf", "ico", "icns", "webp",
    "avif", "heic", "heif",
];

/// How an input image is rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Svg,
    Pdf,
    Raster,
}

impl IconKind {
    pub fn is_vector(self) -> bool {
        matches!(self, IconKind::Svg | IconKind::Pdf)
    }

    /// Shell command converting `input` to `output` inside the container.
    pub fn command(self, input: &str, output: &str) -> String {
        let (input, output) = (quote(input), quote(output));
        match self {
            IconKind::Svg => format!(
                "rsvg-convert -a -w {s} -h {s} --format png {input} | \
                 convert - -background transparent -gravity center -extent {s}x{s} {output}",
                s = ICON_SIZE
            ),
            IconKind::Pdf => format!(
                "convert -density 300 -background transparent {input}[0] -resize {s}x{s}\\> \
                 -gravity center -extent {s}x{s} {output}",
                s = ICON_SIZE
            ),
            IconKind::Raster => format!(
                "convert {input} -background transparent -resize '{s}x{s}>' \
                 -gravity center -extent {s}x{s} {output}",
                s = ICON_SIZE
            ),
        }
    }
}

/// Classifies `path` by extension; `None` for unsupported formats.
pub fn classify(path: &Path) -> Option<IconKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return None;
    }
    Some(match ext.as_str() {
        "svg" => IconKind::Svg,
        "pdf" => IconKind::Pdf,
        _ => IconKind::Raster,
    })
}

/// `<name lowercased, non-alphanumerics as _>_icon.png`.
pub fn standard_png_name(app_name: &str) -> String {
    let stem: String = app_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_icon.png", stem)
}

/// Produces the icon for one slot.
///
/// Without a usable input the cached default icon is returned. A failed
/// conversion falls back to the original file.
pub async fn standardize<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    input: Option<&Path>,
    app_name: &str,
    slot: &str,
) -> Result<PathBuf> {
    let Some((input, kind)) = input.and_then(|path| usable(path, slot)) else {
        log::info!("No usable {} icon supplied, using the default icon", slot);
        return cached_download(DEFAULT_ICON_URL, ctx.cache_dir()).await;
    };

    let out_dir = ctx.temp_dir("icon-", "-convert")?;
    let output = out_dir.join(standard_png_name(app_name));

    match convert(ctx, input, kind, &output).await {
        Ok(()) => {
            log::debug!("✓ Standardized {} icon {}", slot, output.display());
            Ok(output)
        }
        Err(e) => {
            log::warn!(
                "Could not standardize {} icon {}, using it unchanged: {}",
                slot,
                input.display(),
                e
            );
            ctx.release(&out_dir);
            Ok(input.to_path_buf())
        }
    }
}

fn usable<'a>(path: &'a Path, slot: &str) -> Option<(&'a Path, IconKind)> {
    if !path.is_file() {
        log::warn!("{} icon {} not found", slot, path.display());
        return None;
    }
    match classify(path) {
        Some(kind) => Some((path, kind)),
        None => {
            log::warn!("{} icon {} has an unsupported format", slot, path.display());
            None
        }
    }
}

async fn convert<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    input: &Path,
    kind: IconKind,
    output: &Path,
) -> Result<()> {
    let runner = ctx.container_runner("kpacker-icon-", "-work")?;
    let result = convert_in(ctx, &runner, input, kind, output).await;
    runner.dispose();
    result
}

async fn convert_in<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    input: &Path,
    kind: IconKind,
    output: &Path,
) -> Result<()> {
    let ext = input
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let staged = format!("input.{}", ext);
    let produced = "output.png";

    tokio::fs::copy(input, runner.workdir().join(&staged))
        .await
        .fs_context("staging icon", input)?;

    let invocation = runner.invoke(&kind.command(&staged, produced));
    ctx.require(&invocation, "icon conversion").await?;

    let result = runner.workdir().join(produced);
    if !result.is_file() {
        return Err(Error::GenericError(format!(
            "icon conversion produced no {}",
            produced
        )));
    }
    tokio::fs::copy(&result, output)
        .await
        .fs_context("collecting icon", output)?;
    Ok(())
}

/// Standardized icons for every slot of one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSet {
    pub app: PathBuf,
    pub install: PathBuf,
    /// Present only when document types are associated.
    pub document: Option<PathBuf>,
}

impl IconSet {
    /// Standardizes each distinct input once.
    ///
    /// The install icon defaults to the app icon. A slot whose input equals
    /// an earlier slot's reuses that result.
    pub async fn build<R: CommandRunner>(
        ctx: &PackagingContext<R>,
        app: &Application,
    ) -> Result<Self> {
        let inputs = app.icons();
        let name = app.name();

        let app_icon = standardize(ctx, inputs.app.as_deref(), name, "app").await?;

        let install = match inputs.install.as_deref() {
            Some(path) if Some(path) != inputs.app.as_deref() => {
                standardize(ctx, Some(path), name, "install").await?
            }
            _ => app_icon.clone(),
        };

        let document = if app.document_extensions().is_empty() {
            None
        } else {
            Some(match inputs.document.as_deref() {
                None => app_icon.clone(),
                Some(path) if Some(path) == inputs.app.as_deref() => app_icon.clone(),
                Some(path) if Some(path) == inputs.install.as_deref() => install.clone(),
                Some(path) => standardize(ctx, Some(path), name, "document").await?,
            })
        };

        Ok(Self {
            app: app_icon,
            install,
            document,
        })
    }

    /// Whether the install slot has its own image.
    pub fn distinct_install(&self) -> bool {
        self.install != self.app
    }

    /// Whether the document slot has its own image.
    pub fn distinct_document(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|doc| *doc != self.app && *doc != self.install)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a.SVG")), Some(IconKind::Svg));
        assert_eq!(classify(Path::new("a.pdf")), Some(IconKind::Pdf));
        assert_eq!(classify(Path::new("a.heic")), Some(IconKind::Raster));
        assert_eq!(classify(Path::new("a.png")), Some(IconKind::Raster));
        assert!(classify(Path::new("a.xcf")).is_none());
        assert!(classify(Path::new("noext")).is_none());
        assert!(IconKind::Pdf.is_vector());
        assert!(!IconKind::Raster.is_vector());
    }

    #[test]
    fn test_standard_png_name() {
        assert_eq!(standard_png_name("My App 2"), "my_app_2_icon.png");
        assert_eq!(standard_png_name("Ünï"), "_n__icon.png");
    }

    #[test]
    fn test_commands_center_on_fixed_canvas() {
        let raster = IconKind::Raster.command("input.png", "output.png");
        assert_eq!(
            raster,
            "convert input.png -background transparent -resize '512x512>' \
             -gravity center -extent 512x512 output.png"
        );
        let svg = IconKind::Svg.command("input.svg", "output.png");
        assert_eq!(
            svg,
            "rsvg-convert -a -w 512 -h 512 --format png input.svg | \
             convert - -background transparent -gravity center -extent 512x512 output.png"
        );
        let pdf = IconKind::Pdf.command("input.pdf", "output.png");
        assert!(pdf.contains("input.pdf[0]"));
        assert!(pdf.contains("-gravity center -extent 512x512"));

        for command in [raster, svg, pdf] {
            let gravity = command.find("-gravity center").unwrap();
            let extent = command.find("-extent").unwrap();
            assert!(gravity < extent, "{}", command);
        }
    }
}
