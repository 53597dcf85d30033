//! External capabilities
//!
//! Everything the core consumes but does not implement: value coloring, geocoding, routing,
//! route persistence and model file loading. Remote capabilities are async; callers keep
//! the await outside of any registry update.

use crate::{Record, Result};
use async_trait::async_trait;
use geo::Point;

/// Maps a record to a display color, e.g. by classifying one of its values
pub trait DataDescription: Send + Sync {
    /// Raw color for the record (any CSS-like spelling), or `None` to keep the default
    fn value_color(&self, record: &Record) -> Option<String>;
}

/// Lookups between place names and positions
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Position of the best match for a free-text query
    async fn forward(&self, query: &str) -> Result<Point<f64>>;
    /// Display name of the place at `position`
    async fn reverse(&self, position: Point<f64>) -> Result<String>;
}

/// One maneuver of a computed route
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub text: String,
    /// Distance covered by this step in meters
    pub distance_m: f64,
}

/// Result of a routing request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePlan {
    /// Path geometry, `x = lon`, `y = lat`
    pub path: Vec<Point<f64>>,
    pub instructions: Vec<Instruction>,
    /// Total length in meters
    pub distance_m: f64,
}

/// Computes paths through an ordered list of waypoints
#[async_trait]
pub trait Router: Send + Sync {
    async fn route(&self, waypoints: &[Point<f64>]) -> Result<RoutePlan>;
}

/// A saved route point, one per waypoint
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoutePointRecord {
    pub route_id: String,
    pub step: usize,
    /// Well-known-text position, `POINT(lng lat)`
    pub pos: String,
    pub description: String,
}

/// Persists saved routes
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn save(&self, target: &str, points: &[RoutePointRecord]) -> Result<()>;
}

/// Loads the records of a model file
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn load(&self, url: &str, name: &str) -> Result<Vec<Record>>;
}
