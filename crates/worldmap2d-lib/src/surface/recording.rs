//! Headless surface that keeps the scene in memory
//!
//! Useful for server-side synchronisation without a renderer and for driving the core in
//! tests: every layer, entity and view change is kept and can be inspected afterwards.

use super::{AreaStyle, EntityHandle, IconSpec, Interaction, LayerHandle, LineStyle, MapSurface, Tooltip};
use crate::config::BaseLayer;
use geo::{Point, Polygon, Rect};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEntity {
    Marker {
        position: Point<f64>,
        icon: IconSpec,
        tooltip: Option<Tooltip>,
    },
    Area {
        polygon: Polygon<f64>,
        style: AreaStyle,
    },
    Polyline {
        points: Vec<Point<f64>>,
        style: LineStyle,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedLayer {
    pub name: String,
    pub clustered: bool,
    pub attached: bool,
    pub overlay: Option<String>,
    /// Display list in insertion order; duplicates are kept so they can be detected
    pub members: Vec<EntityHandle>,
}

/// In-memory [`MapSurface`]
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: u64,
    layers: HashMap<LayerHandle, RecordedLayer>,
    entities: HashMap<EntityHandle, RecordedEntity>,
    disabled: Vec<Interaction>,
    center: Option<Point<f64>>,
    zoom: Option<f64>,
    bounds: Option<Rect<f64>>,
    base_layer: Option<String>,
    icon_updates: usize,
    destroyed: usize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn layer(&self, handle: LayerHandle) -> Option<&RecordedLayer> {
        self.layers.get(&handle)
    }

    /// First layer created under `name`
    pub fn layer_named(&self, name: &str) -> Option<&RecordedLayer> {
        let mut layers: Vec<_> = self.layers.iter().filter(|(_, l)| l.name == name).collect();
        layers.sort_by_key(|(handle, _)| **handle);
        layers.first().map(|(_, layer)| *layer)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&RecordedEntity> {
        self.entities.get(&handle)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    /// Number of `set_icon` calls so far
    pub fn icon_updates(&self) -> usize {
        self.icon_updates
    }

    pub fn interaction_enabled(&self, interaction: Interaction) -> bool {
        !self.disabled.contains(&interaction)
    }

    pub fn center(&self) -> Option<Point<f64>> {
        self.center
    }

    pub fn zoom(&self) -> Option<f64> {
        self.zoom
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    pub fn base_layer(&self) -> Option<&str> {
        self.base_layer.as_deref()
    }
}

impl MapSurface for RecordingSurface {
    fn create_layer(&mut self, name: &str, clustered: bool) -> LayerHandle {
        let handle = LayerHandle(self.next());
        self.layers.insert(
            handle,
            RecordedLayer {
                name: name.to_string(),
                clustered,
                ..RecordedLayer::default()
            },
        );
        handle
    }

    fn attach_layer(&mut self, layer: LayerHandle) {
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.attached = true;
        }
    }

    fn detach_layer(&mut self, layer: LayerHandle) {
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.attached = false;
        }
    }

    fn register_overlay(&mut self, layer: LayerHandle, name: &str) {
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.overlay = Some(name.to_string());
        }
    }

    fn add_to_layer(&mut self, layer: LayerHandle, entity: EntityHandle) {
        if !self.entities.contains_key(&entity) {
            tracing::warn!("add_to_layer with unknown entity {:?}", entity);
            return;
        }
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.members.push(entity);
        }
    }

    fn remove_from_layer(&mut self, layer: LayerHandle, entity: EntityHandle) {
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.members.retain(|member| *member != entity);
        }
    }

    fn clear_layer(&mut self, layer: LayerHandle) {
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.members.clear();
        }
    }

    fn remove_layer(&mut self, layer: LayerHandle) {
        self.layers.remove(&layer);
    }

    fn create_marker(
        &mut self,
        position: Point<f64>,
        icon: &IconSpec,
        tooltip: Option<&Tooltip>,
    ) -> EntityHandle {
        let handle = EntityHandle(self.next());
        self.entities.insert(
            handle,
            RecordedEntity::Marker {
                position,
                icon: icon.clone(),
                tooltip: tooltip.cloned(),
            },
        );
        handle
    }

    fn create_area(&mut self, polygon: &Polygon<f64>, style: &AreaStyle) -> EntityHandle {
        let handle = EntityHandle(self.next());
        self.entities.insert(
            handle,
            RecordedEntity::Area {
                polygon: polygon.clone(),
                style: style.clone(),
            },
        );
        handle
    }

    fn create_polyline(&mut self, points: &[Point<f64>], style: &LineStyle) -> EntityHandle {
        let handle = EntityHandle(self.next());
        self.entities.insert(
            handle,
            RecordedEntity::Polyline {
                points: points.to_vec(),
                style: style.clone(),
            },
        );
        handle
    }

    fn set_icon(&mut self, entity: EntityHandle, new_icon: &IconSpec) {
        if let Some(RecordedEntity::Marker { icon, .. }) = self.entities.get_mut(&entity) {
            *icon = new_icon.clone();
            self.icon_updates += 1;
        }
    }

    fn destroy(&mut self, entity: EntityHandle) {
        if self.entities.remove(&entity).is_some() {
            self.destroyed += 1;
        }
        for layer in self.layers.values_mut() {
            layer.members.retain(|member| *member != entity);
        }
    }

    fn set_interaction(&mut self, interaction: Interaction, enabled: bool) {
        self.disabled.retain(|i| *i != interaction);
        if !enabled {
            self.disabled.push(interaction);
        }
    }

    fn pan_to(&mut self, center: Point<f64>) {
        self.center = Some(center);
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.zoom = Some(zoom);
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>) {
        self.bounds = Some(bounds);
        self.center = Some(bounds.center().into());
    }

    fn select_base_layer(&mut self, layer: &BaseLayer) {
        self.base_layer = Some(layer.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_membership() {
        let mut surface = RecordingSurface::new();
        let layer = surface.create_layer("sensors", false);
        let marker = surface.create_marker(Point::new(1.0, 2.0), &IconSpec::pin("a.png"), None);
        surface.add_to_layer(layer, marker);
        surface.attach_layer(layer);
        assert_eq!(surface.layer_named("sensors").unwrap().members, vec![marker]);
        assert!(surface.layer(layer).unwrap().attached);

        surface.destroy(marker);
        assert!(surface.layer(layer).unwrap().members.is_empty());
        assert_eq!(surface.entity_count(), 0);
        assert_eq!(surface.destroyed_count(), 1);
    }

    #[test]
    fn test_removed_layer_is_gone() {
        let mut surface = RecordingSurface::new();
        let old = surface.create_layer("models", false);
        surface.register_overlay(old, "models");
        surface.remove_layer(old);
        let new = surface.create_layer("models", false);

        assert_eq!(surface.layer_count(), 1);
        assert!(surface.layer(old).is_none());
        assert_eq!(surface.layer_named("models"), surface.layer(new));
        assert!(surface.layer(new).unwrap().overlay.is_none());
    }

    #[test]
    fn test_interactions_default_enabled() {
        let mut surface = RecordingSurface::new();
        assert!(Interaction::ALL.iter().all(|i| surface.interaction_enabled(*i)));
        surface.set_interaction(Interaction::Dragging, false);
        assert!(!surface.interaction_enabled(Interaction::Dragging));
        surface.set_interaction(Interaction::Dragging, true);
        assert!(surface.interaction_enabled(Interaction::Dragging));
    }
}
