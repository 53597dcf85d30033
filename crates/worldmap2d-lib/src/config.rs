//! Map configuration
//!
//! Every field has a default, so a configuration file only needs to name what it changes.
//! Configurations are read from JSON and checked with [`MapConfig::validate`] before a
//! component is built from them.

use crate::{FieldPath, MapError, RecordKey, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration of a map component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Initial view center latitude
    pub start_lat: f64,
    /// Initial view center longitude
    pub start_lon: f64,
    /// Initial zoom level
    pub zoom: f64,
    /// Largest zoom level the view may reach
    pub max_zoom: f64,
    /// Show zoom buttons on the map
    pub zoom_control: bool,
    /// Show the tile attribution
    pub attribution_control: bool,
    /// Show the distance measuring tool
    pub show_measuring_tool: bool,
    /// Let the user add model files at runtime
    pub allow_add_models: bool,

    /// Fallback latitude attribute for records without a source mapping
    pub lat_attr: FieldPath,
    /// Fallback longitude attribute for records without a source mapping
    pub lon_attr: FieldPath,
    /// Attribute carrying a GeoJSON-like geometry object
    pub geojson_attr: Option<FieldPath>,
    /// Per-source mapping and display options
    pub datasources: BTreeMap<String, DatasourceConfig>,
    /// Attribute compared by [`crate::visibility`] attribute filters
    pub filter_attr: FieldPath,

    /// Group markers of a source into a clustered layer
    pub cluster_markers: bool,

    /// Icon applied to every marker regardless of record state
    pub custom_icon: Option<IconConfig>,
    /// Icon for records whose `completed` field is true
    pub visited_icon: Option<IconConfig>,
    /// Icon for records with fields but not completed
    pub unvisited_icon: Option<IconConfig>,
    /// Icon for the user's own position
    pub user_icon: Option<IconConfig>,
    /// Icon used when nothing else applies
    pub default_icon: IconConfig,
    /// Base URL of the colored marker images (`marker-icon-{COLOR}.png`)
    pub icon_base_url: String,

    /// Name of the linked data description, if markers should be colored by value
    pub data_description: Option<String>,

    /// Tooltip used for sources without their own template
    pub tooltip: TooltipTemplate,

    /// Tile layers the user can switch between
    pub base_layers: Vec<BaseLayer>,
    /// Name of the base layer active at startup, overriding the `active` flags
    pub base_layer_init: Option<String>,

    /// Additional model files drawn on top of the records
    pub model_files: Vec<ModelFile>,

    /// Pan to this record as soon as it arrives
    pub zoom_to: Option<RecordKey>,

    /// Navigation plugin options
    pub navigation: NavigationConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            start_lat: 52.296,
            start_lon: 8.905,
            zoom: 15.0,
            max_zoom: 18.0,
            zoom_control: true,
            attribution_control: true,
            show_measuring_tool: true,
            allow_add_models: false,
            lat_attr: default_path("latitude"),
            lon_attr: default_path("longitude"),
            geojson_attr: None,
            datasources: BTreeMap::new(),
            filter_attr: default_path("type_id"),
            cluster_markers: false,
            custom_icon: None,
            visited_icon: None,
            unvisited_icon: None,
            user_icon: None,
            default_icon: IconConfig {
                url: "imgs/map/marker-icon.png".to_string(),
                color: None,
            },
            icon_base_url: "imgs/map/".to_string(),
            data_description: None,
            tooltip: TooltipTemplate::default(),
            base_layers: vec![BaseLayer::default()],
            base_layer_init: None,
            model_files: Vec::new(),
            zoom_to: None,
            navigation: NavigationConfig::default(),
        }
    }
}

fn default_path(name: &str) -> FieldPath {
    FieldPath::single(name)
}

impl MapConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        tracing::info!("Loading map configuration from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    /// Check value ranges and cross-field consistency
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.start_lat) || !(-180.0..=180.0).contains(&self.start_lon)
        {
            return Err(MapError::Config(format!(
                "start point ({}, {}) is outside WGS84 bounds",
                self.start_lat, self.start_lon
            )));
        }
        if !(0.0..=self.max_zoom).contains(&self.zoom) {
            return Err(MapError::Config(format!(
                "zoom {} must lie between 0 and max_zoom {}",
                self.zoom, self.max_zoom
            )));
        }
        if self.base_layers.is_empty() {
            return Err(MapError::Config("at least one base layer is required".into()));
        }
        if let Some(init) = &self.base_layer_init
            && !self.base_layers.iter().any(|layer| &layer.name == init)
        {
            return Err(MapError::Config(format!("unknown initial base layer '{init}'")));
        }
        for (source, datasource) in &self.datasources {
            if datasource.latitude_attr.is_some() != datasource.longitude_attr.is_some() {
                return Err(MapError::Config(format!(
                    "datasource '{source}' must map both latitude and longitude or neither"
                )));
            }
        }
        for model in &self.model_files {
            if model.url.is_empty() {
                return Err(MapError::Config(format!("model '{}' has no url", model.name)));
            }
        }
        if self.navigation.min_distance_m < 0.0 {
            return Err(MapError::Config("navigation.min_distance_m must not be negative".into()));
        }
        Ok(())
    }

    /// Options for `source`, or the defaults when it is not configured
    pub fn datasource(&self, source: &str) -> DatasourceConfig {
        self.datasources.get(source).cloned().unwrap_or_default()
    }

    /// Base layer active at startup
    pub fn initial_base_layer(&self) -> Option<&BaseLayer> {
        match &self.base_layer_init {
            Some(name) => self.base_layers.iter().find(|layer| &layer.name == name),
            None => self
                .base_layers
                .iter()
                .find(|layer| layer.active)
                .or_else(|| self.base_layers.first()),
        }
    }
}

/// Per-source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasourceConfig {
    pub latitude_attr: Option<FieldPath>,
    pub longitude_attr: Option<FieldPath>,
    /// Whether the source's layer starts attached to the view
    pub displayed: bool,
    /// Tooltip template overriding [`MapConfig::tooltip`]
    pub tooltip: Option<TooltipTemplate>,
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            latitude_attr: None,
            longitude_attr: None,
            displayed: true,
            tooltip: None,
        }
    }
}

/// Tooltip content template with `{field}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipTemplate {
    pub content: String,
    pub options: TooltipOptions,
}

impl Default for TooltipTemplate {
    fn default() -> Self {
        Self {
            content: "<b>{name}{title}</b><br><img src=\"{icon}\" width=\"200\" height=\"100\">"
                .to_string(),
            options: TooltipOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipOptions {
    pub direction: String,
    pub sticky: bool,
    pub opacity: f32,
    pub offset: [i32; 2],
}

impl Default for TooltipOptions {
    fn default() -> Self {
        Self {
            direction: "top".to_string(),
            sticky: false,
            opacity: 0.8,
            offset: [0, -22],
        }
    }
}

/// A configured icon image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconConfig {
    pub url: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A selectable tile layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseLayer {
    pub name: String,
    pub url: String,
    pub attribution: String,
    pub active: bool,
}

impl Default for BaseLayer {
    fn default() -> Self {
        Self {
            name: "OpenStreetMaps".to_string(),
            url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            active: true,
        }
    }
}

/// An additional data file drawn on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl ModelFile {
    /// Whether the url depends on the visible area and must be reloaded when it changes
    pub fn is_viewport_based(&self) -> bool {
        self.url.contains("{lon-left}") || self.url.contains("{lon-right}")
    }
}

/// Transport mode used for route requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Car,
    #[default]
    Bike,
    Foot,
}

/// Options of the navigation plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Connect consecutive records into a route as they arrive
    pub create_route_from_data: bool,
    /// Use straight lines instead of routed paths when connecting records
    pub connect_with_line: bool,
    /// Segments shorter than this are not drawn when connecting records
    pub min_distance_m: f64,
    /// Color of connecting lines without a data description
    pub line_color: String,
    /// Color of the computed route
    pub route_color: String,
    pub travel_mode: TravelMode,
    pub enable_route_save: bool,
    /// Dataset receiving saved route points
    pub route_save_target: Option<String>,
    /// Forward geocoding endpoint
    pub search_url: String,
    /// Reverse geocoding endpoint
    pub reverse_url: String,
    /// Routing service base url
    pub router_url: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            create_route_from_data: false,
            connect_with_line: false,
            min_distance_m: 50.0,
            line_color: "sienna".to_string(),
            route_color: "3388FF".to_string(),
            travel_mode: TravelMode::Bike,
            enable_route_save: false,
            route_save_target: None,
            search_url: "https://nominatim.openstreetmap.org/search".to_string(),
            reverse_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            router_url: "https://router.project-osrm.org".to_string(),
        }
    }
}
