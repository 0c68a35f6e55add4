//! Target build orchestration.
//!
//! # Overview
//!
//! A packaging run:
//! 1. Shares one [`PackagingContext`] (registry, runner, engine, cache)
//! 2. Builds each requested target into its own output directory
//! 3. Delegates to the platform modules for post-processing
//! 4. Reports one [`TargetOutcome`] per target
//!
//! # Example
//!
//! ```no_run
//! use kpacker::bundler::{
//!     Application, HostRunner, PackagingContext, Packager, Target, TempRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> kpacker::bundler::Result<()> {
//! let app = Application::builder("build/libs").name("Demo").build()?;
//! let registry = Arc::new(TempRegistry::new());
//! let ctx = PackagingContext::new(registry, HostRunner, None, "/tmp/kpacker-cache");
//!
//! let packager = Packager::new(ctx, app);
//! for outcome in packager.package_all(&[Target::Generic], "dist".as_ref()).await {
//!     println!("{}: {:?}", outcome.target, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`context`] - Shared dependencies of a packaging run
//! - [`orchestrator`] - Install tree assembly and the multi-target fan-out

pub mod context;
pub mod orchestrator;

pub use context::PackagingContext;
pub use orchestrator::{Packager, TargetOutcome, package_target};
