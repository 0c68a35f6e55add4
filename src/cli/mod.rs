//! Command line interface for kpacker.
//!
//! Parses arguments, builds the application descriptor, packages every
//! requested target and reports one outcome line per target.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::bundler::{
    CleanupGuard, HostRunner, PackagingContext, Packager, TargetOutcome, TempRegistry,
    toolchain::CONTAINER_ENGINE, utils::http,
};
use crate::error::Result;
use path_absolutize::Absolutize;
use std::sync::Arc;

/// Exit code after an interrupt.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    run_with(Args::parse_args()).await
}

/// Runs an already parsed command line.
///
/// Returns 0 only when every target succeeded. Configuration errors are
/// returned before any target starts.
pub async fn run_with(args: Args) -> Result<i32> {
    let output = OutputManager::new(!args.no_ansi, log::log_enabled!(log::Level::Debug));

    args.validate()?;
    let app = args.to_application()?;
    output.verbose(&format!(
        "{} {} (main jar {}, main class {})",
        app.name(),
        app.version(),
        app.main_jar(),
        app.main_class()
    ))?;

    let registry = Arc::new(TempRegistry::new());
    let _guard = args.remove_temp.then(|| {
        install_interrupt_handler(registry.clone());
        CleanupGuard::new(registry.clone())
    });

    let engine = CONTAINER_ENGINE.clone();
    if engine.is_none() {
        output.warn("Neither docker nor podman was found; only the generic target can be built")?;
    }

    let out_root = args.out.absolutize()?.to_path_buf();
    let ctx = PackagingContext::new(registry, HostRunner, engine, http::default_cache_dir()?);
    let packager = Packager::new(ctx, app);

    output.section(&format!("Packaging {}", packager.application().name()))?;
    let outcomes = packager.package_all(&args.target, &out_root).await;

    output.section("Results")?;
    report(&output, &outcomes)?;

    let failed = outcomes.iter().filter(|outcome| !outcome.is_success()).count();
    Ok(if failed == 0 { 0 } else { 1 })
}

fn report(output: &OutputManager, outcomes: &[TargetOutcome]) -> Result<()> {
    for outcome in outcomes {
        match &outcome.result {
            Ok(artifacts) => {
                output.success(&format!("{}", outcome.target))?;
                for artifact in artifacts {
                    output.indent(&artifact.display().to_string())?;
                }
            }
            Err(e) => output.error(&format!("{}: {}", outcome.target, e)),
        }
    }
    Ok(())
}

/// Sweeps the registry and exits on Ctrl-C.
fn install_interrupt_handler(registry: Arc<TempRegistry>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, removing temporary directories");
            registry.release_all();
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}
