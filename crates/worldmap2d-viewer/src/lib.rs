//! Worldmap2d Viewer - Application Library
//!
//! Desktop front end for the map component: a walkers map renders the component's scene,
//! a side panel exposes layers, filters, interactions and the navigation form, and remote
//! geocoding and routing run in the background on tokio.

mod app;
mod logging;

pub use app::WorldmapApp;
pub use app::settings::Settings;
pub use logging::setup_logging;

pub const APP_NAME: &str = "Worldmap2d Viewer";

/// Errors that prevent the viewer from starting
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Map(#[from] worldmap2d_lib::MapError),

    #[error("Invalid records file: {0}")]
    RecordsFile(String),
}
