//! Background removal HTTP server
//!
//! Loads a segmentation model and serves `/remove-bg`, `/ping` and `/health`.

#[cfg(feature = "cli")]
use bgremove_api::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("Server binary not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
