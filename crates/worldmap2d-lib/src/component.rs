//! Worldmap2d - the map component
//!
//! Owns the registry, icon resolver, interaction gate and event bus, and routes dataset
//! notifications and raw surface input through them. Failures are logged and turn the
//! affected action into a no-op; the registry stays consistent.

use crate::config::{MapConfig, ModelFile};
use crate::surface::{AreaStyle, EntityHandle, IconSpec, LayerHandle, LineStyle, MapSurface, Tooltip};
use crate::{
    ClickHandlerSet, DataDescription, DatasetEvent, EventBus, FeatureBuilder, FieldPath, GeoFeature,
    Geometry, HandlerSetId, IconResolver, InputEvent, InteractionGate, InteractionState, MapError,
    MapEvent, MarkerRegistry, ModelRequest, ModelTracker, Record, RecordKey, Result, render_template,
};
use geo::{Point, Rect};
use serde_json::Value;
use std::sync::Arc;

/// Name of the attribute model records carry their geometry in
pub const MODEL_GEOMETRY_ATTR: &str = "geometry";

/// What handling a dataset notification did
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetOutcome {
    Rendered(GeoFeature),
    Removed(bool),
    IconsRefreshed(usize),
}

/// Actions offered by the map's context menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    /// Produce `"lon lat"` for the clipboard
    CopyCoordinates,
    CenterMap,
    ZoomIn,
    ZoomOut,
}

/// Last position reported for the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserPosition {
    pub position: Point<f64>,
    pub heading: Option<f64>,
}

pub struct Worldmap2d<S: MapSurface> {
    config: MapConfig,
    surface: S,
    builder: FeatureBuilder,
    model_builder: FeatureBuilder,
    registry: MarkerRegistry,
    icons: IconResolver,
    gate: InteractionGate,
    events: EventBus,
    models: ModelTracker,
    viewport: Option<(Rect<f64>, f64)>,
    zoom: f64,
    user_position: Option<UserPosition>,
    user_marker: Option<EntityHandle>,
    overlay_layer: Option<LayerHandle>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<S: MapSurface> Worldmap2d<S> {
    /// Build a component on top of `surface`
    ///
    /// The configuration is validated first. A configured data description without an
    /// implementation is logged and markers fall back to the default icons.
    pub fn new(
        config: MapConfig,
        mut surface: S,
        description: Option<Arc<dyn DataDescription>>,
    ) -> Result<Self> {
        config.validate()?;

        if let Some(name) = &config.data_description
            && description.is_none()
        {
            let err = MapError::CapabilityUnavailable(format!("data description '{name}'"));
            tracing::warn!("{}; markers use default icons", err);
        }

        if let Some(base) = config.initial_base_layer() {
            surface.select_base_layer(base);
        }
        surface.pan_to(Point::new(config.start_lon, config.start_lat));
        surface.set_zoom(config.zoom);

        tracing::info!(
            "Worldmap2d ready at ({}, {}) zoom {}",
            config.start_lat,
            config.start_lon,
            config.zoom
        );

        Ok(Self {
            builder: FeatureBuilder::new(&config),
            model_builder: FeatureBuilder::for_geojson(FieldPath::single(MODEL_GEOMETRY_ATTR)),
            registry: MarkerRegistry::from_config(&config),
            icons: IconResolver::new(&config, description),
            gate: InteractionGate::default(),
            events: EventBus::new(),
            models: ModelTracker::new(config.model_files.clone()),
            viewport: None,
            zoom: config.zoom,
            user_position: None,
            user_marker: None,
            overlay_layer: None,
            config,
            surface,
        })
    }

    #[inline]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[inline]
    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    #[inline]
    pub fn icons(&self) -> &IconResolver {
        &self.icons
    }

    #[inline]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    #[inline]
    pub fn interaction_state(&self) -> InteractionState {
        self.gate.state()
    }

    #[inline]
    pub fn feature_builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Last viewport reported by the surface
    #[inline]
    pub fn viewport(&self) -> Option<Rect<f64>> {
        self.viewport.map(|(bounds, _)| bounds)
    }

    #[inline]
    pub fn user_position(&self) -> Option<UserPosition> {
        self.user_position
    }

    // === Dataset synchronisation ===

    /// Apply a dataset notification
    pub fn handle_dataset(&mut self, event: DatasetEvent) -> Result<DatasetOutcome> {
        match event {
            DatasetEvent::RecordAdded(record) | DatasetEvent::AttributeChanged(record) => {
                self.add_record(&record).map(DatasetOutcome::Rendered)
            }
            DatasetEvent::RecordRemoved(key) => Ok(DatasetOutcome::Removed(self.remove_record(&key))),
            DatasetEvent::DataDescriptionChanged => Ok(DatasetOutcome::IconsRefreshed(self.refresh_icons())),
        }
    }

    /// Build the record's feature and render it, replacing any previous entity for its key
    pub fn add_record(&mut self, record: &Record) -> Result<GeoFeature> {
        let feature = self.builder.build(record).inspect_err(|err| {
            tracing::warn!("Skipping record {}: {}", record.key(), err);
        })?;

        match &feature.geometry {
            Geometry::Point(_) => {
                self.upsert_marker(&feature, None)?;
            }
            Geometry::Polygon(polygon) => {
                let binding = self.gate.active_binding();
                self.registry.clear_and_rebuild_area(
                    &mut self.surface,
                    record,
                    polygon.clone(),
                    AreaStyle::default(),
                    binding,
                );
            }
        }

        if self.config.zoom_to.as_ref() == Some(record.key()) {
            tracing::debug!("Zooming to configured record {}", record.key());
            self.zoom_to_set(record)?;
        }
        Ok(feature)
    }

    /// Create or replace the marker for `feature`
    ///
    /// Icon priority: `icon_override`, then the configured custom icon, the visited state,
    /// the data description color and finally the default icon.
    pub fn upsert_marker(&mut self, feature: &GeoFeature, icon_override: Option<IconSpec>) -> Result<EntityHandle> {
        let record = &feature.record;
        let explicit = icon_override.is_some();
        let icon = self.icons.select_icon(record, icon_override.as_ref());
        let tooltip = self.tooltip_for(record);
        let binding = self.gate.active_binding();
        self.registry
            .upsert_marker(&mut self.surface, feature, icon, explicit, tooltip, binding)
            .inspect_err(|err| tracing::warn!("Cannot render marker {}: {}", feature.key(), err))
    }

    fn tooltip_for(&self, record: &Record) -> Option<Tooltip> {
        if !(record.has_value("name") || record.has_value("title") || record.has_value("icon")) {
            return None;
        }
        let template = self
            .config
            .datasources
            .get(record.source())
            .and_then(|ds| ds.tooltip.as_ref())
            .unwrap_or(&self.config.tooltip);
        Some(Tooltip {
            content: render_template(&template.content, record),
            options: template.options.clone(),
        })
    }

    /// Remove the entity for `key`; absent keys are a no-op
    pub fn remove_record(&mut self, key: &RecordKey) -> bool {
        self.registry.remove_entity(&mut self.surface, key)
    }

    /// Remove several markers and the area they belong to
    pub fn remove_area(&mut self, markers: &[RecordKey], area: &RecordKey) -> usize {
        self.registry.remove_area(&mut self.surface, markers, area)
    }

    /// Tear down the layer of `source` with all its entities
    pub fn clear_layer(&mut self, source: &str) -> usize {
        self.registry.clear_layer(&mut self.surface, source)
    }

    /// Replace the layer of `source` with a single polygon
    pub fn clear_and_rebuild_area(&mut self, record: &Record, ring: &[Point<f64>], style: AreaStyle) -> Result<EntityHandle> {
        if ring.len() < 3 {
            return Err(MapError::InvalidGeometry {
                key: record.key().clone(),
                reason: format!("area ring needs at least 3 positions, got {}", ring.len()),
            });
        }
        let polygon = geo::Polygon::new(ring.iter().copied().collect(), vec![]);
        let binding = self.gate.active_binding();
        Ok(self
            .registry
            .clear_and_rebuild_area(&mut self.surface, record, polygon, style, binding))
    }

    // === Icons ===

    /// Re-resolve marker icons, re-applying only changed colors
    pub fn refresh_icons(&mut self) -> usize {
        self.icons.refresh_all(&mut self.registry, &mut self.surface)
    }

    /// Link or unlink a data description and refresh icons
    pub fn set_data_description(&mut self, description: Option<Arc<dyn DataDescription>>) -> usize {
        self.icons.set_description(description);
        self.refresh_icons()
    }

    // === Visibility ===

    pub fn filter_by(&mut self, predicate: Option<&dyn Fn(&Record) -> bool>) -> usize {
        self.registry.filter_by(&mut self.surface, predicate)
    }

    /// Show only records whose filter attribute (default `type_id`) equals `value`
    pub fn filter_markers(&mut self, value: Option<&Value>) -> usize {
        self.registry
            .filter_by_attribute(&mut self.surface, &self.config.filter_attr, value)
    }

    pub fn set_layer_displayed(&mut self, source: &str, displayed: bool) -> bool {
        self.registry.set_layer_displayed(&mut self.surface, source, displayed)
    }

    // === Interaction ===

    pub fn disable_click_interaction(&mut self) -> bool {
        self.gate.disable_click_interaction(&mut self.events)
    }

    pub fn enable_click_interaction(&mut self) -> bool {
        self.gate.enable_click_interaction(&mut self.events)
    }

    pub fn toggle_click_interaction(&mut self) -> bool {
        self.gate.toggle_click_interaction(&mut self.events)
    }

    pub fn disable_all_interactions(&mut self) -> bool {
        self.gate.disable_all_interactions(&mut self.surface, &mut self.events)
    }

    pub fn enable_all_interactions(&mut self) -> bool {
        self.gate.enable_all_interactions(&mut self.surface, &mut self.events)
    }

    /// Route clicks to `set` until [`Self::restore_default_handlers`]
    pub fn activate_override_handlers(&mut self, set: Box<dyn ClickHandlerSet>) -> HandlerSetId {
        self.gate
            .activate_override_handlers(set, &mut self.registry, &mut self.events)
    }

    pub fn restore_default_handlers(&mut self) -> bool {
        self.gate
            .restore_default_handlers(&mut self.registry, &mut self.events)
    }

    /// Feed raw surface input through the gate. Returns whether a handler ran.
    pub fn handle_input(&mut self, input: InputEvent) -> bool {
        match input {
            InputEvent::MapClick { position } => self.gate.dispatch_map_click(position, &mut self.events),
            InputEvent::MarkerClick { entity } => {
                let Some(key) = self.registry.key_for_handle(entity) else {
                    tracing::debug!("Click on unregistered entity {:?}", entity);
                    return false;
                };
                let Some(rendered) = self.registry.get(key) else {
                    return false;
                };
                self.gate
                    .dispatch_marker_click(rendered.binding, &rendered.record, &mut self.events)
            }
            InputEvent::MoveEnd { bounds, zoom } => {
                self.viewport = Some((bounds, zoom));
                self.zoom = zoom;
                self.events.emit(MapEvent::ViewportChanged { bounds, zoom });
                true
            }
        }
    }

    /// Run a context menu action at `position`. Copying returns the text to copy.
    pub fn context_action(&mut self, action: ContextAction, position: Point<f64>) -> Option<String> {
        match action {
            ContextAction::CopyCoordinates => return Some(format!("{} {}", position.x(), position.y())),
            ContextAction::CenterMap => self.surface.pan_to(position),
            ContextAction::ZoomIn => self.set_zoom(self.zoom + 1.0),
            ContextAction::ZoomOut => self.set_zoom(self.zoom - 1.0),
        }
        None
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(0.0, self.config.max_zoom);
        self.surface.set_zoom(self.zoom);
    }

    // === View ===

    /// Pan the view to the record's position
    pub fn zoom_to_set(&mut self, record: &Record) -> Result<()> {
        let position = self.builder.position(record)?;
        self.surface.pan_to(position);
        Ok(())
    }

    /// Pan to an already rendered record
    pub fn zoom_to_key(&mut self, key: &RecordKey) -> bool {
        match self.registry.get(key).and_then(|entity| entity.anchor()) {
            Some(position) => {
                self.surface.pan_to(position);
                true
            }
            None => false,
        }
    }

    /// Switch the tile layer. Returns whether `name` is configured.
    pub fn select_base_layer(&mut self, name: &str) -> bool {
        match self.config.base_layers.iter().find(|layer| layer.name == name) {
            Some(layer) => {
                self.surface.select_base_layer(layer);
                true
            }
            None => {
                tracing::warn!("Unknown base layer '{}'", name);
                false
            }
        }
    }

    /// Store the user's position, pan there and move the single user marker
    pub fn on_user_location(&mut self, position: Point<f64>, heading: Option<f64>) {
        self.user_position = Some(UserPosition { position, heading });
        self.surface.pan_to(position);

        if let Some(old) = self.user_marker.take() {
            self.surface.destroy(old);
        }
        let icon = match &self.config.user_icon {
            Some(config) => IconSpec {
                rotation: heading,
                ..IconSpec::pin(config.url.clone())
            },
            None => IconSpec::user_location(heading),
        };
        let layer = self.overlay_layer();
        let marker = self.surface.create_marker(position, &icon, None);
        self.surface.add_to_layer(layer, marker);
        self.user_marker = Some(marker);
        self.events.emit(MapEvent::UserLocationChanged { position });
    }

    fn overlay_layer(&mut self) -> LayerHandle {
        if let Some(layer) = self.overlay_layer {
            return layer;
        }
        let layer = self.surface.create_layer("overlays", false);
        self.surface.attach_layer(layer);
        self.overlay_layer = Some(layer);
        layer
    }

    /// Draw a polyline outside of any source layer
    pub fn draw_polyline(&mut self, points: &[Point<f64>], style: &LineStyle) -> EntityHandle {
        let layer = self.overlay_layer();
        let line = self.surface.create_polyline(points, style);
        self.surface.add_to_layer(layer, line);
        line
    }

    /// Place a marker outside of any source layer, e.g. for route waypoints
    pub fn place_overlay_marker(&mut self, position: Point<f64>, icon: &IconSpec) -> EntityHandle {
        let layer = self.overlay_layer();
        let marker = self.surface.create_marker(position, icon, None);
        self.surface.add_to_layer(layer, marker);
        marker
    }

    /// Remove something drawn with [`Self::draw_polyline`] or [`Self::place_overlay_marker`]
    pub fn remove_overlay(&mut self, entity: EntityHandle) {
        if let Some(layer) = self.overlay_layer {
            self.surface.remove_from_layer(layer, entity);
        }
        self.surface.destroy(entity);
    }

    // === Model files ===

    pub fn model_files(&self) -> &[ModelFile] {
        self.models.files()
    }

    /// Model files to fetch for the current viewport
    pub fn model_requests(&mut self) -> Vec<ModelRequest> {
        self.models.requests(self.viewport)
    }

    /// Register a model file added at runtime and return what to fetch for it
    pub fn add_model_file(&mut self, file: ModelFile) -> Result<Vec<ModelRequest>> {
        if !self.config.allow_add_models {
            return Err(MapError::Config("adding model files is disabled".into()));
        }
        let name = file.name.clone();
        self.remove_model_file(&name);
        self.models.add(file);
        Ok(self
            .models
            .requests(self.viewport)
            .into_iter()
            .filter(|request| request.name == name)
            .collect())
    }

    /// Replace the drawn content of model `name` with `records`
    ///
    /// Results apply in arrival order; a later result for the same model wins. Returns the
    /// number of records rendered.
    pub fn apply_model(&mut self, name: &str, records: &[Record]) -> usize {
        if !self.models.mark_loaded(name) {
            tracing::debug!("Dropping records of removed model '{}'", name);
            return 0;
        }
        self.registry.remove_source(&mut self.surface, name);

        let binding = self.gate.active_binding();
        let mut rendered = 0;
        for record in records {
            let feature = match self.model_builder.build(record) {
                Ok(feature) => feature,
                Err(err) => {
                    tracing::warn!("Skipping model record {}: {}", record.key(), err);
                    continue;
                }
            };
            match feature.geometry {
                Geometry::Point(_) => {
                    if self.upsert_marker(&feature, None).is_ok() {
                        rendered += 1;
                    }
                }
                Geometry::Polygon(polygon) => {
                    self.registry
                        .upsert_area(&mut self.surface, record, polygon, AreaStyle::default(), binding);
                    rendered += 1;
                }
            }
        }
        tracing::info!("Model '{}' drew {} of {} record(s)", name, rendered, records.len());
        rendered
    }

    /// Erase model `name` from the map and forget it
    pub fn remove_model_file(&mut self, name: &str) -> bool {
        self.registry.clear_layer(&mut self.surface, name);
        self.models.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingSurface;
    use crate::config::IconConfig;
    use serde_json::json;

    fn map() -> Worldmap2d<RecordingSurface> {
        Worldmap2d::new(MapConfig::default(), RecordingSurface::new(), None).unwrap()
    }

    fn sensor(id: i64, lat: f64, lon: f64) -> Record {
        Record::new("sensors", id, json!({"latitude": lat, "longitude": lon, "name": format!("S{id}")}))
    }

    #[test]
    fn test_initial_view() {
        let map = map();
        assert_eq!(map.surface().center(), Some(Point::new(8.905, 52.296)));
        assert_eq!(map.surface().zoom(), Some(15.0));
        assert_eq!(map.surface().base_layer(), Some("OpenStreetMaps"));
    }

    #[test]
    fn test_tooltip_only_with_name_title_or_icon() {
        let mut map = map();
        map.add_record(&sensor(1, 52.0, 8.0)).unwrap();
        map.add_record(&Record::new("sensors", 2, json!({"latitude": 52.0, "longitude": 8.0}))).unwrap();

        let tooltip = |id| match map.surface().entity(map.registry().get(&RecordKey::new("sensors", id)).unwrap().handle) {
            Some(crate::surface::RecordedEntity::Marker { tooltip, .. }) => tooltip.clone(),
            _ => None,
        };
        let first = tooltip(1).unwrap();
        assert!(first.content.starts_with("<b>S1</b>"));
        assert_eq!(first.options.offset, [0, -22]);
        assert!(tooltip(2).is_none());
    }

    #[test]
    fn test_skipped_record_leaves_registry_alone() {
        let mut map = map();
        let bad = Record::new("sensors", 1, json!({"latitude": 52.0}));
        assert!(map.handle_dataset(DatasetEvent::RecordAdded(bad)).is_err());
        assert!(map.registry().is_empty());
        assert!(map.registry().layer("sensors").is_none());
    }

    #[test]
    fn test_polygon_records_become_areas() {
        let config = MapConfig {
            geojson_attr: Some(FieldPath::parse("geo").unwrap()),
            ..MapConfig::default()
        };
        let mut map = Worldmap2d::new(config, RecordingSurface::new(), None).unwrap();
        let zone = Record::new(
            "zones",
            1,
            json!({"geo": {"type": "Polygon", "coordinates": [[8.0, 52.0], [8.1, 52.0], [8.1, 52.1]]}}),
        );
        map.add_record(&zone).unwrap();
        let entity = map.registry().get(zone.key()).unwrap();
        assert!(!entity.is_marker());
        assert_eq!(map.surface().layer_named("zones").unwrap().members.len(), 1);

        let next = Record::new(
            "zones",
            2,
            json!({"geo": {"type": "Polygon", "coordinates": [[9.0, 52.0], [9.1, 52.0], [9.1, 52.1]]}}),
        );
        map.add_record(&next).unwrap();
        map.filter_by(None);
        assert_eq!(map.surface().layer_named("zones").unwrap().members.len(), 1);
        assert!(map.registry().get(zone.key()).is_none());
    }

    #[test]
    fn test_zoom_to_configured_record() {
        let config = MapConfig {
            zoom_to: Some(RecordKey::new("sensors", 2)),
            ..MapConfig::default()
        };
        let mut map = Worldmap2d::new(config, RecordingSurface::new(), None).unwrap();
        map.add_record(&sensor(1, 50.0, 7.0)).unwrap();
        assert_eq!(map.surface().center(), Some(Point::new(8.905, 52.296)));
        map.add_record(&sensor(2, 51.0, 9.0)).unwrap();
        assert_eq!(map.surface().center(), Some(Point::new(9.0, 51.0)));
    }

    #[test]
    fn test_user_location_keeps_single_marker() {
        let mut map = map();
        map.on_user_location(Point::new(8.0, 52.0), None);
        map.on_user_location(Point::new(8.1, 52.1), Some(45.0));
        assert_eq!(map.surface().layer_named("overlays").unwrap().members.len(), 1);
        assert_eq!(map.surface().center(), Some(Point::new(8.1, 52.1)));
        assert_eq!(map.user_position().unwrap().heading, Some(45.0));
    }

    #[test]
    fn test_context_actions() {
        let mut map = map();
        let at = Point::new(8.5, 52.5);
        assert_eq!(map.context_action(ContextAction::CopyCoordinates, at), Some("8.5 52.5".into()));
        map.context_action(ContextAction::CenterMap, at);
        assert_eq!(map.surface().center(), Some(at));
        map.context_action(ContextAction::ZoomIn, at);
        assert_eq!(map.zoom(), 16.0);
        for _ in 0..5 {
            map.context_action(ContextAction::ZoomIn, at);
        }
        assert_eq!(map.zoom(), 18.0);
        map.context_action(ContextAction::ZoomOut, at);
        assert_eq!(map.surface().zoom(), Some(17.0));
    }

    #[test]
    fn test_explicit_icon_survives_refresh() {
        struct Red;
        impl DataDescription for Red {
            fn value_color(&self, _record: &Record) -> Option<String> {
                Some("red".into())
            }
        }
        let mut map = map();
        let feature = map.feature_builder().build(&sensor(1, 52.0, 8.0)).unwrap();
        map.upsert_marker(&feature, Some(IconSpec::pin("special.png"))).unwrap();
        assert_eq!(map.set_data_description(Some(Arc::new(Red))), 0);
    }

    #[test]
    fn test_icon_refresh_only_reapplies_changes() {
        struct Shared(std::sync::RwLock<String>);
        impl DataDescription for Shared {
            fn value_color(&self, _record: &Record) -> Option<String> {
                self.0.read().ok().map(|color| color.clone())
            }
        }
        let description = Arc::new(Shared(std::sync::RwLock::new("#808080".into())));
        let mut map = map();
        map.add_record(&sensor(1, 52.0, 8.0)).unwrap();
        assert_eq!(map.set_data_description(Some(description.clone())), 1);
        let updates = map.surface().icon_updates();
        assert_eq!(map.refresh_icons(), 0);

        *description.0.write().unwrap() = "GREY".into();
        assert_eq!(map.refresh_icons(), 0);
        assert_eq!(map.surface().icon_updates(), updates);

        *description.0.write().unwrap() = "red".into();
        assert_eq!(map.refresh_icons(), 1);
        assert_eq!(map.refresh_icons(), 0);
        assert_eq!(map.surface().icon_updates(), updates + 1);
    }

    #[test]
    fn test_custom_user_icon() {
        let config = MapConfig {
            user_icon: Some(IconConfig { url: "me.png".into(), color: None }),
            ..MapConfig::default()
        };
        let mut map = Worldmap2d::new(config, RecordingSurface::new(), None).unwrap();
        map.on_user_location(Point::new(8.0, 52.0), Some(10.0));
        let layer = map.surface().layer_named("overlays").unwrap();
        match map.surface().entity(layer.members[0]) {
            Some(crate::surface::RecordedEntity::Marker { icon, .. }) => {
                assert_eq!(icon.url, "me.png");
                assert_eq!(icon.rotation, Some(10.0));
            }
            other => panic!("expected marker, got {other:?}"),
        }
    }

    #[test]
    fn test_base_layer_selection() {
        let mut map = map();
        assert!(map.select_base_layer("OpenStreetMaps"));
        assert!(!map.select_base_layer("Satellite"));
    }
}
