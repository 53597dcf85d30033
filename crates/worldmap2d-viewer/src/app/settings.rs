use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Worldmap2d Viewer - dataset records on a 2D world map, with route planning
pub struct Settings {
    /// Map configuration (JSON)
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Records to show on startup: a JSON object mapping source names to arrays of records
    #[clap(short, long, value_name = "FILE")]
    pub records: Vec<PathBuf>,

    /// Nominatim search endpoint (overrides the configuration)
    #[clap(long)]
    pub nominatim_url: Option<String>,

    /// OSRM base url (overrides the configuration)
    #[clap(long)]
    pub osrm_url: Option<String>,

    /// Cluster markers of each source
    #[clap(long, default_value = "false")]
    pub cluster: bool,

    /// Where "Export GPX" writes the planned route
    #[clap(long, default_value = "route.gpx")]
    pub route_export: PathBuf,

    /// Directory receiving saved routes as JSON
    #[clap(long, default_value = "routes")]
    pub route_store_dir: PathBuf,
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}
