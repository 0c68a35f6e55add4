//! kpacker - packages compiled JVM applications for several platforms.
//!
//! This binary builds a generic archive, AppImages, a macOS DMG and a Windows
//! installer from a directory of jars.

use std::process;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let exit_code = match kpacker::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
