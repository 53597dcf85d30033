//! Retained scene behind the map component
//!
//! [`SceneSurface`] is the [`MapSurface`] the component renders into. It only records what
//! should be on screen; the walkers plugin reads the same [`Scene`] every frame to draw it,
//! and the app applies requested view changes to the walkers map memory.

use geo::{Point, Polygon, Rect};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use worldmap2d_lib::config::BaseLayer;
use worldmap2d_lib::geodesy::zoom_for_bounds;
use worldmap2d_lib::{
    AreaStyle, EntityHandle, IconSpec, Interaction, LayerHandle, LineStyle, MapSurface, Tooltip,
};

#[derive(Debug, Clone)]
pub enum SceneEntity {
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

#[derive(Debug, Clone, Default)]
pub struct SceneLayer {
    pub name: String,
    pub attached: bool,
    /// Nearby markers are drawn as one counted bubble
    pub clustered: bool,
    pub members: Vec<EntityHandle>,
}

/// View change requested by the component, applied on the next frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PendingView {
    pub center: Option<Point<f64>>,
    pub zoom: Option<f64>,
}

#[derive(Debug, Default)]
pub struct Scene {
    next_handle: u64,
    layers: HashMap<LayerHandle, SceneLayer>,
    layer_order: Vec<LayerHandle>,
    entities: HashMap<EntityHandle, SceneEntity>,
    disabled: HashSet<Interaction>,
    pending: PendingView,
    base_layer: Option<BaseLayer>,
    max_zoom: f64,
}

impl Scene {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Attached layers in creation order
    pub fn visible_layers(&self) -> impl Iterator<Item = &SceneLayer> {
        self.layer_order
            .iter()
            .filter_map(|handle| self.layers.get(handle))
            .filter(|layer| layer.attached)
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&SceneEntity> {
        self.entities.get(&handle)
    }

    pub fn is_enabled(&self, interaction: Interaction) -> bool {
        !self.disabled.contains(&interaction)
    }

    pub fn base_layer(&self) -> Option<&BaseLayer> {
        self.base_layer.as_ref()
    }

    pub fn has_pending_view(&self) -> bool {
        self.pending != PendingView::default()
    }

    /// Take the view change requested since the last call
    pub fn take_pending_view(&mut self) -> PendingView {
        std::mem::take(&mut self.pending)
    }

    fn layer_mut(&mut self, layer: LayerHandle) -> Option<&mut SceneLayer> {
        self.layers.get_mut(&layer)
    }
}

/// Shared handle to the scene
#[derive(Debug, Clone, Default)]
pub struct SharedScene(Arc<RwLock<Scene>>);

impl SharedScene {
    pub fn read(&self) -> RwLockReadGuard<'_, Scene> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Scene> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`MapSurface`] writing into a [`SharedScene`]
#[derive(Debug, Clone)]
pub struct SceneSurface {
    scene: SharedScene,
}

impl SceneSurface {
    pub fn new(scene: SharedScene, max_zoom: f64) -> Self {
        scene.write().max_zoom = max_zoom;
        Self { scene }
    }
}

impl MapSurface for SceneSurface {
    fn create_layer(&mut self, name: &str, clustered: bool) -> LayerHandle {
        let mut scene = self.scene.write();
        let handle = LayerHandle(scene.next());
        scene.layers.insert(
            handle,
            SceneLayer {
                name: name.to_string(),
                clustered,
                ..SceneLayer::default()
            },
        );
        scene.layer_order.push(handle);
        handle
    }

    fn attach_layer(&mut self, layer: LayerHandle) {
        if let Some(layer) = self.scene.write().layer_mut(layer) {
            layer.attached = true;
        }
    }

    fn detach_layer(&mut self, layer: LayerHandle) {
        if let Some(layer) = self.scene.write().layer_mut(layer) {
            layer.attached = false;
        }
    }

    fn register_overlay(&mut self, _layer: LayerHandle, name: &str) {
        // The side panel lists overlays straight from the registry
        tracing::trace!("Overlay '{}' registered", name);
    }

    fn add_to_layer(&mut self, layer: LayerHandle, entity: EntityHandle) {
        if let Some(layer) = self.scene.write().layer_mut(layer) {
            layer.members.push(entity);
        }
    }

    fn remove_from_layer(&mut self, layer: LayerHandle, entity: EntityHandle) {
        if let Some(layer) = self.scene.write().layer_mut(layer) {
            layer.members.retain(|member| *member != entity);
        }
    }

    fn clear_layer(&mut self, layer: LayerHandle) {
        if let Some(layer) = self.scene.write().layer_mut(layer) {
            layer.members.clear();
        }
    }

    fn remove_layer(&mut self, layer: LayerHandle) {
        let mut scene = self.scene.write();
        scene.layers.remove(&layer);
        scene.layer_order.retain(|handle| *handle != layer);
    }

    fn create_marker(&mut self, position: Point<f64>, icon: &IconSpec, tooltip: Option<&Tooltip>) -> EntityHandle {
        let mut scene = self.scene.write();
        let handle = EntityHandle(scene.next());
        scene.entities.insert(
            handle,
            SceneEntity::Marker {
                position,
                icon: icon.clone(),
                tooltip: tooltip.cloned(),
            },
        );
        handle
    }

    fn create_area(&mut self, polygon: &Polygon<f64>, style: &AreaStyle) -> EntityHandle {
        let mut scene = self.scene.write();
        let handle = EntityHandle(scene.next());
        scene.entities.insert(
            handle,
            SceneEntity::Area {
                polygon: polygon.clone(),
                style: style.clone(),
            },
        );
        handle
    }

    fn create_polyline(&mut self, points: &[Point<f64>], style: &LineStyle) -> EntityHandle {
        let mut scene = self.scene.write();
        let handle = EntityHandle(scene.next());
        scene.entities.insert(
            handle,
            SceneEntity::Polyline {
                points: points.to_vec(),
                style: style.clone(),
            },
        );
        handle
    }

    fn set_icon(&mut self, entity: EntityHandle, new_icon: &IconSpec) {
        if let Some(SceneEntity::Marker { icon, .. }) = self.scene.write().entities.get_mut(&entity) {
            *icon = new_icon.clone();
        }
    }

    fn destroy(&mut self, entity: EntityHandle) {
        let mut scene = self.scene.write();
        scene.entities.remove(&entity);
        for layer in scene.layers.values_mut() {
            layer.members.retain(|member| *member != entity);
        }
    }

    fn set_interaction(&mut self, interaction: Interaction, enabled: bool) {
        let mut scene = self.scene.write();
        if enabled {
            scene.disabled.remove(&interaction);
        } else {
            scene.disabled.insert(interaction);
        }
    }

    fn pan_to(&mut self, center: Point<f64>) {
        self.scene.write().pending.center = Some(center);
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.scene.write().pending.zoom = Some(zoom);
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>) {
        let mut scene = self.scene.write();
        let zoom = zoom_for_bounds(bounds, scene.max_zoom);
        scene.pending = PendingView {
            center: Some(bounds.center().into()),
            zoom: Some(zoom),
        };
    }

    fn select_base_layer(&mut self, layer: &BaseLayer) {
        self.scene.write().base_layer = Some(layer.clone());
    }
}
