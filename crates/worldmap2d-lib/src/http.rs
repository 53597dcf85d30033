//! HTTP implementations of the remote capabilities
//!
//! - [`NominatimGeocoder`]: forward and reverse geocoding against a Nominatim instance
//! - [`OsrmRouter`]: routing against an OSRM server
//! - [`HttpModelSource`]: GeoJSON FeatureCollections as model records

use crate::capability::{Geocoder, Instruction, ModelSource, RoutePlan, Router};
use crate::component::MODEL_GEOMETRY_ATTR;
use crate::config::{NavigationConfig, TravelMode};
use crate::record::value_as_i64;
use crate::{MapError, Record, Result};
use async_trait::async_trait;
use geo::Point;
use lru::LruCache;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

const USER_AGENT: &str = concat!("worldmap2d/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(20);
const REVERSE_CACHE_SIZE: usize = 256;

fn remote(context: &str, err: impl std::fmt::Display) -> MapError {
    MapError::RemoteCallFailed(format!("{context}: {err}"))
}

fn client() -> Result<Client> {
    Client::builder()
        .timeout(TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| remote("building HTTP client", e))
}

async fn get_json<T: DeserializeOwned>(request: reqwest::RequestBuilder, context: &str) -> Result<T> {
    let response = request.send().await.map_err(|e| remote(context, e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(remote(
            context,
            format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
        ));
    }
    response.json().await.map_err(|e| remote(context, e))
}

// === Geocoding ===

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    error: Option<String>,
}

/// Cache key at roughly 10 cm resolution
fn cache_key(position: Point<f64>) -> (i64, i64) {
    ((position.x() * 1e6).round() as i64, (position.y() * 1e6).round() as i64)
}

/// Geocoder backed by Nominatim, caching reverse lookups
pub struct NominatimGeocoder {
    http: Client,
    search_url: String,
    reverse_url: String,
    reverse_cache: Mutex<LruCache<(i64, i64), String>>,
}

impl NominatimGeocoder {
    pub fn new(search_url: impl Into<String>, reverse_url: impl Into<String>) -> Result<Self> {
        let capacity = NonZeroUsize::new(REVERSE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            http: client()?,
            search_url: search_url.into(),
            reverse_url: reverse_url.into(),
            reverse_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn from_config(config: &NavigationConfig) -> Result<Self> {
        Self::new(config.search_url.clone(), config.reverse_url.clone())
    }

    fn cached(&self, key: (i64, i64)) -> Option<String> {
        self.reverse_cache.lock().ok()?.get(&key).cloned()
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn forward(&self, query: &str) -> Result<Point<f64>> {
        let request = self
            .http
            .get(&self.search_url)
            .query(&[("q", query), ("format", "geojson"), ("limit", "1")]);
        let found: FeatureCollection = get_json(request, "geocoding").await?;

        let coordinates = found
            .features
            .into_iter()
            .find_map(|feature| feature.geometry)
            .and_then(|geometry| geometry.get("coordinates").cloned());
        match coordinates.as_ref().and_then(Value::as_array).map(Vec::as_slice) {
            Some([lon, lat, ..]) => match (lon.as_f64(), lat.as_f64()) {
                (Some(lon), Some(lat)) => Ok(Point::new(lon, lat)),
                _ => Err(remote("geocoding", "non-numeric coordinates")),
            },
            _ => Err(remote("geocoding", format!("no match for '{query}'"))),
        }
    }

    async fn reverse(&self, position: Point<f64>) -> Result<String> {
        let key = cache_key(position);
        if let Some(name) = self.cached(key) {
            return Ok(name);
        }

        let lat = position.y().to_string();
        let lon = position.x().to_string();
        let request = self
            .http
            .get(&self.reverse_url)
            .query(&[("lat", lat.as_str()), ("lon", lon.as_str()), ("format", "json")]);
        let result: ReverseResult = get_json(request, "reverse geocoding").await?;

        let name = match (result.display_name, result.error) {
            (Some(name), _) => name,
            (None, Some(error)) => return Err(remote("reverse geocoding", error)),
            (None, None) => return Err(remote("reverse geocoding", "no display name")),
        };
        if let Ok(mut cache) = self.reverse_cache.lock() {
            cache.put(key, name.clone());
        }
        Ok(name)
    }
}

// === Routing ===

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
}

impl OsrmStep {
    fn text(&self) -> String {
        let mut text = match (self.maneuver.kind.as_str(), &self.maneuver.modifier) {
            ("depart", _) => "Head out".to_string(),
            ("arrive", _) => return "You have arrived at your destination".to_string(),
            (kind, Some(modifier)) => format!("{} {}", capitalize(kind), modifier),
            (kind, None) => capitalize(kind),
        };
        if !self.name.is_empty() {
            text.push_str(" onto ");
            text.push_str(&self.name);
        }
        text
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// OSRM profile for a travel mode
pub fn osrm_profile(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Car => "driving",
        TravelMode::Bike => "cycling",
        TravelMode::Foot => "foot",
    }
}

/// Router backed by an OSRM server
pub struct OsrmRouter {
    http: Client,
    base_url: String,
    profile: &'static str,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>, mode: TravelMode) -> Result<Self> {
        Ok(Self {
            http: client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            profile: osrm_profile(mode),
        })
    }

    pub fn from_config(config: &NavigationConfig) -> Result<Self> {
        Self::new(config.router_url.clone(), config.travel_mode)
    }

    fn route_url(&self, waypoints: &[Point<f64>]) -> String {
        let coordinates = waypoints
            .iter()
            .map(|p| format!("{},{}", p.x(), p.y()))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson&steps=true",
            self.base_url, self.profile, coordinates
        )
    }
}

#[async_trait]
impl Router for OsrmRouter {
    async fn route(&self, waypoints: &[Point<f64>]) -> Result<RoutePlan> {
        if waypoints.len() < 2 {
            return Err(MapError::NavigationIncomplete(format!(
                "routing needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        let response: OsrmResponse = get_json(self.http.get(self.route_url(waypoints)), "routing").await?;
        if response.code != "Ok" {
            return Err(remote(
                "routing",
                format!("{} {}", response.code, response.message.unwrap_or_default()),
            ));
        }
        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| remote("routing", "no route found"))?;

        tracing::debug!("OSRM route: {:.0} m, {} points", route.distance, route.geometry.coordinates.len());
        Ok(RoutePlan {
            path: route
                .geometry
                .coordinates
                .iter()
                .map(|[lon, lat]| Point::new(*lon, *lat))
                .collect(),
            instructions: route
                .legs
                .iter()
                .flat_map(|leg| &leg.steps)
                .map(|step| Instruction {
                    text: step.text(),
                    distance_m: step.distance,
                })
                .collect(),
            distance_m: route.distance,
        })
    }
}

// === Model files ===

/// Loads GeoJSON FeatureCollections over HTTP
pub struct HttpModelSource {
    http: Client,
}

impl HttpModelSource {
    pub fn new() -> Result<Self> {
        Ok(Self { http: client()? })
    }
}

/// Turn the features of a collection into records of source `name`
///
/// The id is taken from the feature, then its `id` property, then its index. The geometry
/// is stored under `geometry` next to the properties.
pub fn records_from_geojson(name: &str, collection: Value) -> Result<Vec<Record>> {
    let collection: FeatureCollection = serde_json::from_value(collection)?;
    Ok(collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let mut fields = feature.properties.unwrap_or_default();
            let id = feature
                .id
                .as_ref()
                .and_then(value_as_i64)
                .or_else(|| fields.get("id").and_then(value_as_i64))
                .unwrap_or(index as i64);
            if let Some(geometry) = feature.geometry {
                fields.insert(MODEL_GEOMETRY_ATTR.to_string(), geometry);
            }
            Record::new(name, id, Value::Object(fields))
        })
        .collect())
}

#[async_trait]
impl ModelSource for HttpModelSource {
    async fn load(&self, url: &str, name: &str) -> Result<Vec<Record>> {
        let collection: Value = get_json(self.http.get(url), "loading model file").await?;
        let records = records_from_geojson(name, collection)?;
        tracing::info!("Model '{}' delivered {} feature(s)", name, records.len());
        Ok(records)
    }
}
