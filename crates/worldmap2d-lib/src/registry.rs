//! Marker/Area Registry - rendered entities by record key and layers by source
//!
//! The registry owns the mapping from `(source, id)` to the entity a surface renders for it
//! and from `source` to the [`Layer`] grouping those entities. Entities are kept in a keyed
//! map plus an insertion-ordered key sequence; both always hold the same set of keys.
//!
//! Layers are created lazily for the first entity of a source and are only torn down by
//! [`MarkerRegistry::clear_layer`], never because they became empty.

use crate::config::MapConfig;
use crate::surface::{AreaStyle, EntityHandle, IconSpec, LayerHandle, MapSurface, Tooltip};
use crate::{ColorToken, GeoFeature, Geometry, HandlerSetId, MapError, Record, RecordKey, Result};
use geo::{Point, Polygon};
use std::collections::{HashMap, HashSet};

/// What an entity renders as
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Marker {
        position: Point<f64>,
        tooltip: Option<Tooltip>,
    },
    Area {
        polygon: Polygon<f64>,
        style: AreaStyle,
    },
}

/// The registry's view of one rendered record
#[derive(Debug, Clone)]
pub struct RenderedEntity {
    pub handle: EntityHandle,
    pub kind: EntityKind,
    /// Record state the entity was last built from
    pub record: Record,
    /// Color of the icon currently applied, as last set by the registry
    pub applied_color: Option<ColorToken>,
    /// Click-handler set this entity currently dispatches to
    pub binding: HandlerSetId,
    explicit_icon: bool,
}

impl RenderedEntity {
    #[inline]
    pub fn key(&self) -> &RecordKey {
        self.record.key()
    }

    #[inline]
    pub fn is_marker(&self) -> bool {
        matches!(self.kind, EntityKind::Marker { .. })
    }

    /// Whether the icon was forced by an override and must survive icon refreshes
    #[inline]
    pub fn has_explicit_icon(&self) -> bool {
        self.explicit_icon
    }

    /// Point to pan to for this entity
    pub fn anchor(&self) -> Option<Point<f64>> {
        match &self.kind {
            EntityKind::Marker { position, .. } => Some(*position),
            EntityKind::Area { polygon, .. } => polygon.exterior().points().next(),
        }
    }
}

/// Display group for one source
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub handle: LayerHandle,
    /// Whether the layer is attached to the view
    pub displayed: bool,
    pub clustered: bool,
    /// Keys currently in the layer's display list
    pub(crate) shown: HashSet<RecordKey>,
}

impl Layer {
    #[inline]
    pub fn is_shown(&self, key: &RecordKey) -> bool {
        self.shown.contains(key)
    }

    #[inline]
    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }
}

/// Keyed index of rendered entities and per-source layers
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entities: HashMap<RecordKey, RenderedEntity>,
    order: Vec<RecordKey>,
    by_handle: HashMap<EntityHandle, RecordKey>,
    layers: HashMap<String, Layer>,
    cluster: bool,
    hidden_sources: HashSet<String>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose layers follow the clustering and `displayed` options of `config`
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            cluster: config.cluster_markers,
            hidden_sources: config
                .datasources
                .iter()
                .filter(|(_, ds)| !ds.displayed)
                .map(|(source, _)| source.clone())
                .collect(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in insertion order
    #[inline]
    pub fn keys(&self) -> &[RecordKey] {
        &self.order
    }

    #[inline]
    pub fn get(&self, key: &RecordKey) -> Option<&RenderedEntity> {
        self.entities.get(key)
    }

    pub(crate) fn entity_mut(&mut self, key: &RecordKey) -> Option<&mut RenderedEntity> {
        self.entities.get_mut(key)
    }

    /// Entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RenderedEntity> {
        self.order.iter().filter_map(|key| self.entities.get(key))
    }

    /// Key of the record rendered by `handle`
    pub fn key_for_handle(&self, handle: EntityHandle) -> Option<&RecordKey> {
        self.by_handle.get(&handle)
    }

    pub fn layer(&self, source: &str) -> Option<&Layer> {
        self.layers.get(source)
    }

    pub(crate) fn layer_mut(&mut self, source: &str) -> Option<&mut Layer> {
        self.layers.get_mut(source)
    }

    /// Layers sorted by name
    pub fn layers(&self) -> Vec<&Layer> {
        let mut layers: Vec<_> = self.layers.values().collect();
        layers.sort_by(|a, b| a.name.cmp(&b.name));
        layers
    }

    /// Whether the keyed map, the ordered sequence and the handle index agree
    pub fn is_consistent(&self) -> bool {
        let ordered: HashSet<&RecordKey> = self.order.iter().collect();
        ordered.len() == self.order.len()
            && ordered.len() == self.entities.len()
            && self.entities.keys().all(|key| ordered.contains(key))
            && self.by_handle.len() == self.entities.len()
            && self
                .entities
                .iter()
                .all(|(key, entity)| self.by_handle.get(&entity.handle) == Some(key))
    }

    /// Layer for `source`, created on first use
    pub fn ensure_layer(&mut self, surface: &mut dyn MapSurface, source: &str) -> LayerHandle {
        if let Some(layer) = self.layers.get(source) {
            return layer.handle;
        }

        let displayed = !self.hidden_sources.contains(source);
        let handle = surface.create_layer(source, self.cluster);
        if displayed {
            surface.attach_layer(handle);
        }
        surface.register_overlay(handle, source);
        tracing::debug!(
            "Created layer '{}' (clustered: {}, displayed: {})",
            source,
            self.cluster,
            displayed
        );

        self.layers.insert(
            source.to_string(),
            Layer {
                name: source.to_string(),
                handle,
                displayed,
                clustered: self.cluster,
                shown: HashSet::new(),
            },
        );
        handle
    }

    /// Create or replace the marker for the feature's key
    ///
    /// A replaced entity keeps its position in the ordered sequence.
    pub fn upsert_marker(
        &mut self,
        surface: &mut dyn MapSurface,
        feature: &GeoFeature,
        icon: IconSpec,
        explicit_icon: bool,
        tooltip: Option<Tooltip>,
        binding: HandlerSetId,
    ) -> Result<EntityHandle> {
        let Geometry::Point(position) = feature.geometry else {
            return Err(MapError::InvalidGeometry {
                key: feature.key().clone(),
                reason: "markers need point geometry".to_string(),
            });
        };

        let layer = self.ensure_layer(surface, feature.record.source());
        let handle = surface.create_marker(position, &icon, tooltip.as_ref());
        let entity = RenderedEntity {
            handle,
            kind: EntityKind::Marker { position, tooltip },
            record: feature.record.clone(),
            applied_color: icon.color,
            binding,
            explicit_icon,
        };
        self.insert(surface, layer, entity);
        Ok(handle)
    }

    /// Replace the source layer's current shapes with a single polygon for `key`
    ///
    /// Areas of other records in the source are destroyed. Markers of the source stay
    /// registered but leave the display list.
    pub fn clear_and_rebuild_area(
        &mut self,
        surface: &mut dyn MapSurface,
        record: &Record,
        polygon: Polygon<f64>,
        style: AreaStyle,
        binding: HandlerSetId,
    ) -> EntityHandle {
        let source = record.source().to_string();
        let superseded: Vec<RecordKey> = self
            .order
            .iter()
            .filter(|key| key.source == source && *key != record.key())
            .filter(|key| self.entities.get(*key).is_some_and(|entity| !entity.is_marker()))
            .cloned()
            .collect();
        for key in &superseded {
            self.remove_entity(surface, key);
        }

        let layer = self.ensure_layer(surface, &source);
        surface.clear_layer(layer);
        if let Some(layer) = self.layers.get_mut(&source) {
            layer.shown.clear();
        }
        self.upsert_area(surface, record, polygon, style, binding)
    }

    /// Create or replace the area for the record's key, leaving the rest of the layer alone
    pub fn upsert_area(
        &mut self,
        surface: &mut dyn MapSurface,
        record: &Record,
        polygon: Polygon<f64>,
        style: AreaStyle,
        binding: HandlerSetId,
    ) -> EntityHandle {
        let layer = self.ensure_layer(surface, record.source());
        let handle = surface.create_area(&polygon, &style);
        let entity = RenderedEntity {
            handle,
            kind: EntityKind::Area { polygon, style },
            record: record.clone(),
            applied_color: None,
            binding,
            explicit_icon: false,
        };
        self.insert(surface, layer, entity);
        handle
    }

    fn insert(&mut self, surface: &mut dyn MapSurface, layer: LayerHandle, entity: RenderedEntity) {
        let key = entity.key().clone();
        let handle = entity.handle;

        if let Some(old) = self.entities.remove(&key) {
            self.by_handle.remove(&old.handle);
            if let Some(layer) = self.layers.get(&key.source)
                && layer.shown.contains(&key)
            {
                surface.remove_from_layer(layer.handle, old.handle);
            }
            surface.destroy(old.handle);
        } else {
            self.order.push(key.clone());
        }

        surface.add_to_layer(layer, handle);
        if let Some(layer) = self.layers.get_mut(&key.source) {
            layer.shown.insert(key.clone());
        }
        self.by_handle.insert(handle, key.clone());
        self.entities.insert(key, entity);
    }

    /// Remove the entity for `key`. Absent keys are a no-op.
    ///
    /// Returns whether an entity was removed.
    pub fn remove_entity(&mut self, surface: &mut dyn MapSurface, key: &RecordKey) -> bool {
        let Some(entity) = self.entities.remove(key) else {
            tracing::trace!("remove_entity: {} is not registered", key);
            return false;
        };

        if let Some(layer) = self.layers.get_mut(&key.source)
            && layer.shown.remove(key)
        {
            surface.remove_from_layer(layer.handle, entity.handle);
        }
        surface.destroy(entity.handle);
        self.by_handle.remove(&entity.handle);
        self.order.retain(|k| k != key);
        true
    }

    /// Remove an area together with the markers that belong to it
    pub fn remove_area(
        &mut self,
        surface: &mut dyn MapSurface,
        markers: &[RecordKey],
        area: &RecordKey,
    ) -> usize {
        markers
            .iter()
            .chain(std::iter::once(area))
            .filter(|key| self.remove_entity(surface, key))
            .count()
    }

    /// Destroy every entity of `source`, keeping its layer
    pub fn remove_source(&mut self, surface: &mut dyn MapSurface, source: &str) -> usize {
        let keys: Vec<RecordKey> = self
            .order
            .iter()
            .filter(|key| key.source == source)
            .cloned()
            .collect();
        for key in &keys {
            self.remove_entity(surface, key);
        }
        keys.len()
    }

    /// Destroy every entity of `source` and tear its layer down
    pub fn clear_layer(&mut self, surface: &mut dyn MapSurface, source: &str) -> usize {
        let removed = self.remove_source(surface, source);
        if let Some(layer) = self.layers.remove(source) {
            surface.remove_layer(layer.handle);
            tracing::debug!("Tore down layer '{}'", source);
        }
        removed
    }

    /// Point every entity at `binding`
    pub(crate) fn rebind_all(&mut self, binding: HandlerSetId) {
        for entity in self.entities.values_mut() {
            entity.binding = binding;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasourceConfig;
    use crate::surface::RecordingSurface;
    use geo::LineString;
    use proptest::prelude::*;
    use serde_json::json;

    fn point_feature(source: &str, id: i64, lon: f64, lat: f64) -> GeoFeature {
        GeoFeature {
            geometry: Geometry::Point(Point::new(lon, lat)),
            record: Record::new(source, id, json!({"name": format!("{source}-{id}")})),
        }
    }

    fn add(registry: &mut MarkerRegistry, surface: &mut RecordingSurface, source: &str, id: i64) -> EntityHandle {
        registry
            .upsert_marker(
                surface,
                &point_feature(source, id, 8.0, 52.0),
                IconSpec::pin("m.png"),
                false,
                None,
                HandlerSetId::DEFAULT,
            )
            .unwrap()
    }

    fn square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            vec![],
        )
    }

    #[test]
    fn test_lazy_layer_creation() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        assert!(registry.layer("sensors").is_none());

        add(&mut registry, &mut surface, "sensors", 1);
        add(&mut registry, &mut surface, "sensors", 2);

        assert_eq!(surface.layer_count(), 1);
        let layer = surface.layer_named("sensors").unwrap();
        assert!(layer.attached);
        assert_eq!(layer.overlay.as_deref(), Some("sensors"));
        assert_eq!(layer.members.len(), 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        add(&mut registry, &mut surface, "s", 1);
        add(&mut registry, &mut surface, "s", 2);
        let replacement = add(&mut registry, &mut surface, "s", 1);

        assert_eq!(registry.keys(), &[RecordKey::new("s", 1), RecordKey::new("s", 2)]);
        assert_eq!(registry.get(&RecordKey::new("s", 1)).unwrap().handle, replacement);
        assert_eq!(surface.entity_count(), 2);
        assert_eq!(surface.layer_named("s").unwrap().members.len(), 2);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        add(&mut registry, &mut surface, "s", 1);

        assert!(registry.remove_entity(&mut surface, &RecordKey::new("s", 1)));
        assert!(!registry.remove_entity(&mut surface, &RecordKey::new("s", 1)));
        assert!(!registry.remove_entity(&mut surface, &RecordKey::new("other", 9)));
        assert!(registry.is_empty());
        assert_eq!(surface.destroyed_count(), 1);
        // Empty layers survive
        assert!(registry.layer("s").is_some());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_hidden_source_layer() {
        let mut config = MapConfig::default();
        config.datasources.insert(
            "archive".into(),
            DatasourceConfig {
                displayed: false,
                ..DatasourceConfig::default()
            },
        );
        config.cluster_markers = true;
        let mut registry = MarkerRegistry::from_config(&config);
        let mut surface = RecordingSurface::new();
        add(&mut registry, &mut surface, "archive", 1);

        let layer = surface.layer_named("archive").unwrap();
        assert!(!layer.attached);
        assert!(layer.clustered);
        assert!(!registry.layer("archive").unwrap().displayed);
    }

    #[test]
    fn test_area_rebuild_clears_layer() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        add(&mut registry, &mut surface, "zones", 1);
        let record = Record::new("zones", 2, json!({}));
        let area = registry.clear_and_rebuild_area(
            &mut surface,
            &record,
            square(),
            AreaStyle::default(),
            HandlerSetId::DEFAULT,
        );

        assert_eq!(surface.layer_named("zones").unwrap().members, vec![area]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.layer("zones").unwrap().is_shown(&RecordKey::new("zones", 1)));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_area_rebuild_destroys_previous_area() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        for id in [1, 2] {
            registry.clear_and_rebuild_area(
                &mut surface,
                &Record::new("zones", id, json!({})),
                square(),
                AreaStyle::default(),
                HandlerSetId::DEFAULT,
            );
        }

        assert_eq!(registry.keys(), &[RecordKey::new("zones", 2)]);
        assert_eq!(surface.entity_count(), 1);
        registry.filter_by(&mut surface, None);
        assert_eq!(surface.layer_named("zones").unwrap().members.len(), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_area_rebuild_of_same_key_replaces_it() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        let record = Record::new("zones", 1, json!({}));
        registry.clear_and_rebuild_area(&mut surface, &record, square(), AreaStyle::default(), HandlerSetId::DEFAULT);
        let area =
            registry.clear_and_rebuild_area(&mut surface, &record, square(), AreaStyle::default(), HandlerSetId::DEFAULT);

        assert_eq!(registry.len(), 1);
        assert_eq!(surface.layer_named("zones").unwrap().members, vec![area]);
        assert_eq!(surface.destroyed_count(), 1);
    }

    #[test]
    fn test_cleared_layer_is_released() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        for _ in 0..3 {
            add(&mut registry, &mut surface, "s", 1);
            registry.clear_layer(&mut surface, "s");
            assert_eq!(surface.layer_count(), 0);
        }
        add(&mut registry, &mut surface, "s", 1);

        assert_eq!(surface.layer_count(), 1);
        let layer = surface.layer_named("s").unwrap();
        assert_eq!(layer.members.len(), 1);
        assert!(layer.attached);
    }

    #[test]
    fn test_marker_needs_point() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        let feature = GeoFeature {
            geometry: Geometry::Polygon(square()),
            record: Record::new("s", 1, json!({})),
        };
        let result = registry.upsert_marker(
            &mut surface,
            &feature,
            IconSpec::pin("m.png"),
            false,
            None,
            HandlerSetId::DEFAULT,
        );
        assert!(matches!(result, Err(MapError::InvalidGeometry { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_area_and_clear_layer() {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        add(&mut registry, &mut surface, "zones", 1);
        add(&mut registry, &mut surface, "zones", 2);
        add(&mut registry, &mut surface, "other", 1);
        let removed = registry.remove_area(
            &mut surface,
            &[RecordKey::new("zones", 1)],
            &RecordKey::new("zones", 2),
        );
        assert_eq!(removed, 2);

        assert_eq!(registry.clear_layer(&mut surface, "other"), 1);
        assert!(registry.layer("other").is_none());
        assert!(registry.is_empty());
        assert!(registry.is_consistent());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Upsert(u8, i64),
        Remove(u8, i64),
        Area(u8, i64),
        Clear(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u8..3, 0i64..8).prop_map(|(s, id)| Op::Upsert(s, id)),
            3 => (0u8..3, 0i64..8).prop_map(|(s, id)| Op::Remove(s, id)),
            1 => (0u8..3, 0i64..8).prop_map(|(s, id)| Op::Area(s, id)),
            1 => (0u8..3).prop_map(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn prop_index_stays_consistent(ops in proptest::collection::vec(op(), 0..64)) {
            let mut registry = MarkerRegistry::new();
            let mut surface = RecordingSurface::new();
            for op in ops {
                match op {
                    Op::Upsert(s, id) => {
                        add(&mut registry, &mut surface, &format!("src{s}"), id);
                    }
                    Op::Remove(s, id) => {
                        registry.remove_entity(&mut surface, &RecordKey::new(format!("src{s}"), id));
                    }
                    Op::Area(s, id) => {
                        let record = Record::new(format!("src{s}"), id, json!({}));
                        registry.clear_and_rebuild_area(
                            &mut surface, &record, square(), AreaStyle::default(), HandlerSetId::DEFAULT,
                        );
                    }
                    Op::Clear(s) => {
                        registry.clear_layer(&mut surface, &format!("src{s}"));
                    }
                }
                prop_assert!(registry.is_consistent());
                prop_assert_eq!(registry.len(), surface.entity_count());
            }
        }
    }
}
