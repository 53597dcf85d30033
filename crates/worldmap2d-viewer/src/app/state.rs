//! Application state management
//!
//! [`AppState`] owns the map component, the navigation plugin and the background tasks,
//! and applies everything that reaches them from the UI: plugin input, task results and
//! records loaded from files.

use crate::ViewerError;
use crate::app::plugin::{PluginInput, ViewSnapshot};
use crate::app::settings::Settings;
use crate::app::surface::{SceneSurface, SharedScene};
use crate::app::tasks::{Capabilities, FileRouteStore, TaskResult, Tasks};
use egui::Pos2;
use geo::{Point, Rect};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use worldmap2d_lib::geodesy::{distance_km, format_distance};
use worldmap2d_lib::http::{HttpModelSource, NominatimGeocoder, OsrmRouter};
use worldmap2d_lib::navigation::{Navigation, PickTarget, export_gpx, route_id_now};
use worldmap2d_lib::{
    ContextAction, DatasetEvent, DatasetOutcome, EntityHandle, Geocoder, InputEvent, LineStyle, MapConfig, MapError, MapEvent, MapSurface,
    ModelSource, Record, RecordKey, Result, Router, Worldmap2d,
};

/// Messages kept for the status list
const MAX_MESSAGES: usize = 20;

/// Sidebar tabs
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SidebarTab {
    Layers,
    Navigation,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone, Debug)]
pub struct UiSettings {
    pub sidebar_open: bool,
    pub active_tab: SidebarTab,
    /// Value typed into the type filter
    pub filter_value: String,
    pub filter_active: bool,
    /// Free-text search per navigation input
    pub search_start: String,
    pub search_destination: String,
    /// Model file form
    pub model_name: String,
    pub model_url: String,
    /// Name of the selected base layer
    pub base_layer: Option<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            active_tab: SidebarTab::Layers,
            filter_value: String::new(),
            filter_active: false,
            search_start: String::new(),
            search_destination: String::new(),
            model_name: String::new(),
            model_url: String::new(),
            base_layer: None,
        }
    }
}

/// Open context menu: where it was requested on screen and on the map
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContextMenu {
    pub screen: Pos2,
    pub position: Point<f64>,
}

/// Distance measuring tool state
#[derive(Debug, Default)]
pub struct Measurement {
    pub active: bool,
    pub points: Vec<Point<f64>>,
    line: Option<EntityHandle>,
}

impl Measurement {
    /// Total length of the measured path in meters
    pub fn meters(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| distance_km(pair[0], pair[1]) * 1000.0)
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

/// Main application state
pub struct AppState {
    pub map: Worldmap2d<SceneSurface>,
    pub navigation: Navigation,
    pub tasks: Tasks,
    pub ui_settings: UiSettings,
    pub messages: Vec<StatusMessage>,
    pub context_menu: Option<ContextMenu>,
    pub measurement: Measurement,
    /// Record of the last clicked marker
    pub selected: Option<Record>,
    pub route_export: PathBuf,
    last_bounds: Option<Rect<f64>>,
}

impl AppState {
    /// Build the state from the command line, reading the configuration file if given
    pub fn new(settings: &Settings, scene: SharedScene, ctx: egui::Context) -> std::result::Result<Self, ViewerError> {
        let mut config = match &settings.config {
            Some(path) => MapConfig::load(path)?,
            None => MapConfig::default(),
        };
        apply_overrides(&mut config, settings);

        let capabilities = Capabilities {
            geocoder: optional("geocoder", NominatimGeocoder::from_config(&config.navigation))
                .map(|geocoder| Arc::new(geocoder) as Arc<dyn Geocoder>),
            router: optional("router", OsrmRouter::from_config(&config.navigation))
                .map(|router| Arc::new(router) as Arc<dyn Router>),
            models: optional("model source", HttpModelSource::new())
                .map(|models| Arc::new(models) as Arc<dyn ModelSource>),
            store: Arc::new(FileRouteStore::new(&settings.route_store_dir)),
        };

        let mut state = Self::with_config(config, scene, Tasks::new(ctx, capabilities))?;
        state.route_export = settings.route_export.clone();

        for path in &settings.records {
            match state.load_records(path) {
                Ok(count) => state.info(format!("Loaded {} record(s) from {}", count, path.display())),
                Err(err) => state.error(format!("Loading {} failed: {}", path.display(), err)),
            }
        }
        state.request_models();
        Ok(state)
    }

    pub fn with_config(config: MapConfig, scene: SharedScene, tasks: Tasks) -> Result<Self> {
        let surface = SceneSurface::new(scene, config.max_zoom);
        let navigation = Navigation::new(config.navigation.clone());
        let ui_settings = UiSettings {
            base_layer: config.initial_base_layer().map(|layer| layer.name.clone()),
            ..UiSettings::default()
        };
        let map = Worldmap2d::new(config, surface, None)?;
        Ok(Self {
            map,
            navigation,
            tasks,
            ui_settings,
            messages: Vec::new(),
            context_menu: None,
            measurement: Measurement::default(),
            selected: None,
            route_export: PathBuf::from("route.gpx"),
            last_bounds: None,
        })
    }

    // === Status ===

    fn push_message(&mut self, text: String, is_error: bool) {
        self.messages.push(StatusMessage { text, is_error });
        if self.messages.len() > MAX_MESSAGES {
            self.messages.remove(0);
        }
    }

    pub fn info(&mut self, text: String) {
        tracing::info!("{}", text);
        self.push_message(text, false);
    }

    pub fn error(&mut self, text: String) {
        tracing::error!("{}", text);
        self.push_message(text, true);
    }

    /// Log and show a failed action
    pub fn report(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.error(err.to_string());
        }
    }

    // === Records ===

    /// Load a JSON object mapping source names to arrays of records
    pub fn load_records(&mut self, path: &Path) -> std::result::Result<usize, ViewerError> {
        let json = std::fs::read_to_string(path).map_err(MapError::from)?;
        let sources: Map<String, Value> = serde_json::from_str(&json).map_err(MapError::from)?;

        let mut count = 0;
        for (source, records) in sources {
            let Value::Array(records) = records else {
                return Err(ViewerError::RecordsFile(format!("'{source}' is not an array of records")));
            };
            for value in records {
                match Record::from_json(source.clone(), value) {
                    Ok(record) => {
                        self.dataset(DatasetEvent::RecordAdded(record));
                        count += 1;
                    }
                    Err(err) => tracing::warn!("Skipping record of '{}': {}", source, err),
                }
            }
        }
        Ok(count)
    }

    /// Feed a dataset notification to the map and the navigation chaining
    pub fn dataset(&mut self, event: DatasetEvent) {
        match self.map.handle_dataset(event) {
            Ok(DatasetOutcome::Rendered(feature)) => {
                if let Some([from, to]) = self.navigation.after_record_added(&mut self.map, &feature) {
                    let result = self.tasks.route_segment(from, to);
                    self.report(result);
                }
            }
            Ok(outcome) => tracing::trace!("Dataset event handled: {:?}", outcome),
            Err(err) => tracing::warn!("Dataset event skipped: {}", err),
        }
    }

    // === Input ===

    /// Apply what the map plugin reported during the last frame
    pub fn process_plugin_inputs(&mut self, inputs: Vec<PluginInput>) {
        for input in inputs {
            match input {
                PluginInput::MapClick(position) if self.measurement.active => self.measure_to(position),
                PluginInput::MapClick(position) => {
                    self.context_menu = None;
                    self.map.handle_input(InputEvent::MapClick { position });
                }
                PluginInput::MarkerClick(entity) => {
                    self.context_menu = None;
                    self.map.handle_input(InputEvent::MarkerClick { entity });
                }
                PluginInput::ClusterClick(position) => {
                    self.context_menu = None;
                    self.map.context_action(ContextAction::CenterMap, position);
                    self.map.context_action(ContextAction::ZoomIn, position);
                }
                PluginInput::ContextMenu { screen, position } => {
                    self.context_menu = Some(ContextMenu { screen, position });
                }
            }
        }

        for request in self.navigation.process_clicks(&self.map) {
            self.tasks.reverse_geocode(request);
        }
        self.process_map_events();
    }

    fn process_map_events(&mut self) {
        for event in self.map.events_mut().drain() {
            match event {
                MapEvent::MarkerClicked { key } => self.select(&key),
                MapEvent::MapClicked { .. } => self.selected = None,
                other => tracing::trace!("Map event: {:?}", other),
            }
        }
    }

    fn select(&mut self, key: &RecordKey) {
        self.selected = self.map.registry().get(key).map(|entity| entity.record.clone());
    }

    /// Report a finished view change once the pointer is released
    pub fn process_view(&mut self, view: Option<ViewSnapshot>, zoom: f64) {
        let Some(view) = view else {
            return;
        };
        if view.pointer_down || self.last_bounds == Some(view.bounds) {
            return;
        }
        self.last_bounds = Some(view.bounds);
        self.map.handle_input(InputEvent::MoveEnd {
            bounds: view.bounds,
            zoom,
        });
        self.process_map_events();
        self.request_models();
    }

    /// Center of the last reported view
    pub fn view_center(&self) -> Option<Point<f64>> {
        self.last_bounds.map(|bounds| bounds.center().into())
    }

    #[inline]
    pub fn last_bounds(&self) -> Option<Rect<f64>> {
        self.last_bounds
    }

    // === Background results ===

    pub fn process_task_results(&mut self) {
        for result in self.tasks.drain() {
            self.apply_task_result(result);
        }
    }

    pub fn apply_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Label { request, label } => match label {
                Ok(label) => {
                    if !self.navigation.planner_mut().apply_label(request, label) {
                        tracing::debug!("Input changed before its label arrived");
                    }
                }
                Err(err) => tracing::debug!("Reverse geocoding failed, keeping coordinates: {}", err),
            },
            TaskResult::Route(Ok(plan)) => self.navigation.apply_route(&mut self.map, plan),
            TaskResult::Route(Err(err)) => self.error(format!("Routing failed: {err}")),
            TaskResult::Segment(Ok(plan)) => {
                self.navigation.apply_segment(&mut self.map, &plan);
            }
            TaskResult::Segment(Err(err)) => tracing::warn!("Routing a data segment failed: {}", err),
            TaskResult::Model { name, records } => match records {
                Ok(records) => {
                    self.map.apply_model(&name, &records);
                }
                Err(err) => self.error(format!("Model '{name}' failed to load: {err}")),
            },
            TaskResult::Geocoded { target, query, position } => match position {
                Ok(position) => {
                    self.navigation.planner_mut().set(target, position, query);
                    self.map.surface_mut().pan_to(position);
                }
                Err(err) => self.error(format!("No place found for '{query}': {err}")),
            },
            TaskResult::Saved { target, result } => match result {
                Ok(count) => self.info(format!("Saved {count} route point(s) to '{target}'")),
                Err(err) => self.error(format!("Saving the route failed: {err}")),
            },
        }
    }

    fn request_models(&mut self) {
        for request in self.map.model_requests() {
            let result = self.tasks.load_model(request);
            self.report(result);
        }
    }

    // === Actions ===

    pub fn apply_filter(&mut self) {
        let value = self.ui_settings.filter_value.trim();
        let shown = if self.ui_settings.filter_active && !value.is_empty() {
            let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
            self.map.filter_markers(Some(&value))
        } else {
            self.map.filter_markers(None)
        };
        tracing::debug!("{} marker(s) shown after filtering", shown);
    }

    pub fn select_base_layer(&mut self, name: &str) {
        if self.map.select_base_layer(name) {
            self.ui_settings.base_layer = Some(name.to_string());
        }
    }

    pub fn add_model_file(&mut self) {
        let file = worldmap2d_lib::config::ModelFile {
            url: self.ui_settings.model_url.trim().to_string(),
            name: self.ui_settings.model_name.trim().to_string(),
            kind: None,
        };
        if file.url.is_empty() || file.name.is_empty() {
            self.error("A model file needs a name and a url".to_string());
            return;
        }
        match self.map.add_model_file(file) {
            Ok(requests) => {
                for request in requests {
                    let result = self.tasks.load_model(request);
                    self.report(result);
                }
                self.ui_settings.model_name.clear();
                self.ui_settings.model_url.clear();
            }
            Err(err) => self.error(err.to_string()),
        }
    }

    /// Report the view center as the user's position
    pub fn locate_at_view_center(&mut self) {
        match self.view_center() {
            Some(center) => self.map.on_user_location(center, None),
            None => self.error("The map has not been drawn yet".to_string()),
        }
    }

    pub fn toggle_navigation_menu(&mut self) {
        if self.measurement.active {
            self.toggle_measurement();
        }
        self.navigation.toggle_menu(&mut self.map);
    }

    pub fn search(&mut self, target: PickTarget) {
        let query = match target {
            PickTarget::Start => self.ui_settings.search_start.trim().to_string(),
            PickTarget::Destination => self.ui_settings.search_destination.trim().to_string(),
            PickTarget::Waypoint(_) => return,
        };
        if query.is_empty() {
            return;
        }
        let result = self.tasks.geocode(target, query);
        self.report(result);
    }

    pub fn use_user_location(&mut self) {
        let result = self.navigation.use_user_location(&self.map);
        self.report(result);
    }

    pub fn compute_route(&mut self) {
        let result = self
            .navigation
            .begin_route(&mut self.map)
            .and_then(|waypoints| self.tasks.route(waypoints));
        self.report(result);
    }

    pub fn stop_navigation(&mut self) {
        self.navigation.stop_navigation(&mut self.map);
        self.ui_settings.search_start.clear();
        self.ui_settings.search_destination.clear();
    }

    pub fn export_route(&mut self) {
        let result = std::fs::File::create(&self.route_export)
            .map_err(MapError::from)
            .and_then(|file| export_gpx(self.navigation.planner(), std::io::BufWriter::new(file)));
        match result {
            Ok(()) => self.info(format!("Route exported to {}", self.route_export.display())),
            Err(err) => self.error(err.to_string()),
        }
    }

    pub fn save_route(&mut self) {
        let result = self
            .navigation
            .prepare_save(&route_id_now())
            .and_then(|(target, points)| self.tasks.save(target, points));
        self.report(result);
    }

    // === Measuring tool ===

    pub fn toggle_measurement(&mut self) {
        self.measurement.active = !self.measurement.active;
        self.measurement.points.clear();
        if let Some(line) = self.measurement.line.take() {
            self.map.remove_overlay(line);
        }
        if self.measurement.active {
            self.map.disable_click_interaction();
        } else {
            self.map.enable_click_interaction();
        }
    }

    fn measure_to(&mut self, position: Point<f64>) {
        self.measurement.points.push(position);
        if let Some(line) = self.measurement.line.take() {
            self.map.remove_overlay(line);
        }
        if self.measurement.points.len() >= 2 {
            let style = LineStyle {
                color: "#333333".to_string(),
                weight: 2.0,
                opacity: 0.9,
            };
            self.measurement.line = Some(self.map.draw_polyline(&self.measurement.points, &style));
        }
        tracing::debug!("Measured {}", format_distance(self.measurement.meters()));
    }
}

fn optional<T>(what: &str, capability: Result<T>) -> Option<T> {
    capability
        .inspect_err(|err| tracing::warn!("No {} available: {}", what, err))
        .ok()
}

/// Command line values win over the configuration file
fn apply_overrides(config: &mut MapConfig, settings: &Settings) {
    if let Some(url) = &settings.nominatim_url {
        let base = url.trim_end_matches('/');
        let base = base.strip_suffix("/search").unwrap_or(base);
        config.navigation.search_url = format!("{base}/search");
        config.navigation.reverse_url = format!("{base}/reverse");
    }
    if let Some(url) = &settings.osrm_url {
        config.navigation.router_url = url.clone();
    }
    if settings.cluster {
        config.cluster_markers = true;
    }
}
