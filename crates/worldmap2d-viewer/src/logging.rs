//! Logging setup for the viewer

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the `fmt` subscriber, filtered by `RUST_LOG`
///
/// If `RUST_LOG` is not set, a default is chosen per build type.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var(
                    "RUST_LOG",
                    "info,worldmap2d_lib=debug,worldmap2d_viewer=debug,eframe::native=warn,egui::context=warn,walkers=info,reqwest::connect=info",
                );
            } else {
                std::env::set_var("RUST_LOG", "info,eframe=warn");
            }
        }
    }

    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(
        "{} v{} (profiling {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        if cfg!(feature = "profiling") { "enabled" } else { "disabled" }
    );
}
