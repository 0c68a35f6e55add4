//! Code signing and notarization with rcodesign.
//!
//! Every item is signed in a container with its parent directory mounted at
//! `/work` and the certificate and password directories at `/certs` and
//! `/secrets`. Children are always signed before the bundle containing them.

use crate::bundler::{
    builder::PackagingContext,
    error::{Context, Result},
    toolchain::{CommandRunner, ToolInvocation, VolumeMount, quote},
};
use goblin::mach::{
    fat::FAT_MAGIC,
    header::{MH_MAGIC, MH_MAGIC_64},
};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const TIMESTAMP_URL: &str = "http://timestamp.apple.com/ts01";
const LIBRARY_EXTENSIONS: &[&str] = &["dylib", "jnilib", "so"];

/// Certificate and password file used for every signing call.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub p12_file: &'a Path,
    pub p12_pass: &'a Path,
}

/// Kind of a signable file inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// Matched by extension, signed without the runtime flag.
    Library,
    /// Extensionless Mach-O, signed with the runtime flag.
    Executable,
}

/// One signing call of a bundle plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignStep {
    pub path: PathBuf,
    pub runtime: bool,
}

/// What happened while signing a bundle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignReport {
    pub signed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub unverified: Vec<PathBuf>,
}

/// Whether `header` starts with a Mach-O or universal binary magic.
pub fn is_macho_magic(header: &[u8]) -> bool {
    let Some(bytes) = header.get(..4) else {
        return false;
    };
    let bytes = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let le = u32::from_le_bytes(bytes);
    le == MH_MAGIC_64 || le == MH_MAGIC || u32::from_be_bytes(bytes) == FAT_MAGIC
}

/// Kind of `path`, or `None` when it is not signable or cannot be read.
fn classify(path: &Path) -> Option<BinaryKind> {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some(ext) if LIBRARY_EXTENSIONS.contains(&ext) => Some(BinaryKind::Library),
        Some(_) => None,
        None => match read_header(path) {
            Ok(header) => is_macho_magic(&header).then_some(BinaryKind::Executable),
            Err(e) => {
                log::warn!("Skipping unreadable file {}: {}", path.display(), e);
                None
            }
        },
    }
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(4);
    std::fs::File::open(path)?
        .take(4)
        .read_to_end(&mut header)?;
    Ok(header)
}

/// Signable binaries under `bundle`, in walk order.
///
/// Entries that cannot be read are logged and skipped.
pub fn find_binaries(bundle: &Path) -> Result<Vec<(PathBuf, BinaryKind)>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(bundle).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 => {
                log::warn!("Skipping unreadable bundle entry: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = classify(entry.path()) {
            found.push((entry.into_path(), kind));
        }
    }
    Ok(found)
}

/// Ordered signing calls for `bundle`: libraries, executables, then the bundle.
pub fn signing_plan(bundle: &Path) -> Result<Vec<SignStep>> {
    let binaries = find_binaries(bundle)?;
    let libraries = binaries
        .iter()
        .filter(|(_, kind)| *kind == BinaryKind::Library)
        .map(|(path, _)| SignStep {
            path: path.clone(),
            runtime: false,
        });
    let executables = binaries
        .iter()
        .filter(|(_, kind)| *kind == BinaryKind::Executable)
        .map(|(path, _)| SignStep {
            path: path.clone(),
            runtime: true,
        });

    let mut plan: Vec<SignStep> = libraries.chain(executables).collect();
    plan.push(SignStep {
        path: bundle.to_path_buf(),
        runtime: true,
    });
    Ok(plan)
}

fn split(path: &Path) -> Result<(&Path, String)> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    let name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?
        .to_string_lossy()
        .into_owned();
    Ok((parent, name))
}

fn sign_invocation<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    item: &Path,
    credentials: Credentials<'_>,
    runtime: bool,
) -> Result<ToolInvocation> {
    let (work, name) = split(item)?;
    let (certs, p12) = split(credentials.p12_file)?;
    let (secrets, pass) = split(credentials.p12_pass)?;

    let mut command = format!(
        "rcodesign sign --p12-file /certs/{} --p12-password-file /secrets/{} \
         --timestamp-url {} --for-notarization",
        quote(&p12),
        quote(&pass),
        TIMESTAMP_URL
    );
    if runtime {
        command.push_str(" --code-signature-flags runtime");
    }
    command.push_str(&format!(" /work/{}", quote(&name)));

    Ok(ctx.engine()?.invocation(
        &[
            VolumeMount::new(work, "/work"),
            VolumeMount::new(certs, "/certs"),
            VolumeMount::new(secrets, "/secrets"),
        ],
        None,
        &command,
    ))
}

fn verify_invocation<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    item: &Path,
) -> Result<ToolInvocation> {
    let (work, name) = split(item)?;
    Ok(ctx.engine()?.invocation(
        &[VolumeMount::new(work, "/work")],
        None,
        &format!("rcodesign verify /work/{}", quote(&name)),
    ))
}

/// Result of signing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Failed,
    Unverified,
    Verified,
}

/// Signs a single item and verifies it.
///
/// A failed verification is only logged; the item still counts as signed.
pub async fn sign_item<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    item: &Path,
    credentials: Credentials<'_>,
    runtime: bool,
) -> Result<SignOutcome> {
    let sign = sign_invocation(ctx, item, credentials, runtime)?;
    if !ctx.attempt(&sign, &format!("signing {}", item.display())).await {
        return Ok(SignOutcome::Failed);
    }
    let verify = verify_invocation(ctx, item)?;
    if !ctx.attempt(&verify, &format!("verifying {}", item.display())).await {
        return Ok(SignOutcome::Unverified);
    }
    log::debug!("✓ Signed {}", item.display());
    Ok(SignOutcome::Verified)
}

/// Signs every binary in `bundle` and then the bundle itself.
pub async fn sign_bundle<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    bundle: &Path,
    credentials: Credentials<'_>,
) -> Result<SignReport> {
    let plan = signing_plan(bundle)?;
    log::info!(
        "Signing {} with {} embedded binaries",
        bundle.display(),
        plan.len() - 1
    );

    let mut report = SignReport::default();
    for step in plan {
        match sign_item(ctx, &step.path, credentials, step.runtime).await? {
            SignOutcome::Failed => report.failed.push(step.path),
            SignOutcome::Unverified => {
                report.unverified.push(step.path.clone());
                report.signed.push(step.path);
            }
            SignOutcome::Verified => report.signed.push(step.path),
        }
    }

    if report.failed.is_empty() {
        log::info!("✓ Signed {}", bundle.display());
    } else {
        log::warn!(
            "{} of {} signing calls failed for {}",
            report.failed.len(),
            report.failed.len() + report.signed.len(),
            bundle.display()
        );
    }
    Ok(report)
}

/// Submits `dmg` for notarization and staples the ticket.
pub async fn notarize<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    dmg: &Path,
    api_key: &Path,
) -> Result<bool> {
    let (work, name) = split(dmg)?;
    let (config, key) = split(api_key)?;
    let invocation = ctx.engine()?.invocation(
        &[
            VolumeMount::new(work, "/work"),
            VolumeMount::new(config, "/config"),
        ],
        None,
        &format!(
            "rcodesign notary-submit --api-key-file /config/{} --staple /work/{}",
            quote(&key),
            quote(&name)
        ),
    );

    log::info!("Notarizing {}", dmg.display());
    let ok = ctx.attempt(&invocation, "notarization").await;
    if ok {
        log::info!("✓ Notarized {}", dmg.display());
    }
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macho_magic() {
        assert!(is_macho_magic(&[0xcf, 0xfa, 0xed, 0xfe, 0x07]));
        assert!(is_macho_magic(&[0xce, 0xfa, 0xed, 0xfe]));
        assert!(is_macho_magic(&[0xca, 0xfe, 0xba, 0xbe]));
        assert!(!is_macho_magic(b"#!/b"));
        assert!(!is_macho_magic(&[0xcf, 0xfa]));
    }

    #[test]
    fn test_plan_signs_children_first() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Demo.app");
        let macos = bundle.join("Contents/MacOS");
        let lib = bundle.join("Contents/runtime/Contents/Home/lib");
        std::fs::create_dir_all(&macos).unwrap();
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(macos.join("Demo"), [0xcf, 0xfa, 0xed, 0xfe, 0, 0]).unwrap();
        std::fs::write(macos.join("launch"), b"#!/bin/sh\n").unwrap();
        std::fs::write(lib.join("libjava.dylib"), b"").unwrap();
        std::fs::write(lib.join("libjli.jnilib"), b"").unwrap();
        std::fs::write(lib.join("classes.jsa"), [0xca, 0xfe, 0xba, 0xbe]).unwrap();

        let plan = signing_plan(&bundle).unwrap();
        let paths: Vec<PathBuf> = plan.iter().map(|s| s.path.clone()).collect();
        assert_eq!(
            paths,
            [
                lib.join("libjava.dylib"),
                lib.join("libjli.jnilib"),
                macos.join("Demo"),
                bundle.clone(),
            ]
        );
        let runtime: Vec<bool> = plan.iter().map(|s| s.runtime).collect();
        assert_eq!(runtime, [false, false, true, true]);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        assert_eq!(classify(Path::new("/nonexistent/Contents/MacOS/Demo")), None);
        assert_eq!(
            classify(Path::new("/nonexistent/libdemo.dylib")),
            Some(BinaryKind::Library)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_plan_survives_locked_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Demo.app");
        let macos = bundle.join("Contents/MacOS");
        std::fs::create_dir_all(&macos).unwrap();
        std::fs::write(macos.join("Demo"), [0xcf, 0xfa, 0xed, 0xfe]).unwrap();
        let locked = macos.join("helper");
        std::fs::write(&locked, [0xcf, 0xfa, 0xed, 0xfe]).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let plan = signing_plan(&bundle);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).unwrap();

        let plan = plan.unwrap();
        assert!(plan.iter().any(|s| s.path == macos.join("Demo") && s.runtime));
        assert_eq!(plan.last().unwrap().path, bundle);
    }
}
