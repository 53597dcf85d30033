//! Rendering capability
//!
//! [`MapSurface`] is everything the core needs from a map renderer: layers that hold
//! entities, markers, areas and polylines, view control and interaction toggles. Entities
//! and layers are referred to by opaque handles handed out by the surface.

mod recording;

pub use recording::{RecordedEntity, RecordedLayer, RecordingSurface};

use crate::ColorToken;
use crate::config::{BaseLayer, TooltipOptions};
use geo::{Point, Polygon, Rect};

/// Opaque reference to a layer created by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub u64);

/// Opaque reference to a marker, area or polyline created by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);

/// Marker image description
#[derive(Debug, Clone, PartialEq)]
pub struct IconSpec {
    pub url: String,
    /// Color the image was selected for, if it was selected by color
    pub color: Option<ColorToken>,
    pub size: [u32; 2],
    pub anchor: [i32; 2],
    pub popup_anchor: [i32; 2],
    pub shadow_size: Option<[u32; 2]>,
    pub title: Option<String>,
    /// Rotation in degrees, used by the user position marker
    pub rotation: Option<f64>,
}

impl IconSpec {
    /// Standard pin image at `url`
    pub fn pin(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            color: None,
            size: [25, 41],
            anchor: [12, 41],
            popup_anchor: [1, -34],
            shadow_size: Some([41, 41]),
            title: None,
            rotation: None,
        }
    }

    /// Colored pin `marker-icon-{COLOR}.png` below `base_url`
    pub fn colored(base_url: &str, color: ColorToken, title: Option<String>) -> Self {
        Self {
            color: Some(color.clone()),
            title,
            ..Self::pin(format!("{base_url}marker-icon-{color}.png"))
        }
    }

    /// Small animated circle used for route waypoints and destinations
    pub fn pulse() -> Self {
        Self {
            url: "pulse".to_string(),
            color: None,
            size: [22, 22],
            anchor: [15, 15],
            popup_anchor: [0, 0],
            shadow_size: None,
            title: None,
            rotation: None,
        }
    }

    /// Position marker for the user, optionally showing the heading
    pub fn user_location(heading: Option<f64>) -> Self {
        Self {
            url: "user-location".to_string(),
            size: [22, 22],
            anchor: [25, 25],
            rotation: heading,
            ..Self::pulse()
        }
    }
}

/// Fill style of an area
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStyle {
    pub color: String,
    pub fill_opacity: f32,
}

impl Default for AreaStyle {
    fn default() -> Self {
        Self {
            color: "red".to_string(),
            fill_opacity: 0.2,
        }
    }
}

/// Stroke style of a polyline
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: String,
    pub weight: f32,
    pub opacity: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: "red".to_string(),
            weight: 3.0,
            opacity: 1.0,
        }
    }
}

/// Rendered tooltip of a marker
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub content: String,
    pub options: TooltipOptions,
}

/// Map input handled by the surface itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interaction {
    Dragging,
    TouchZoom,
    DoubleClickZoom,
    ScrollWheelZoom,
    BoxZoom,
    Keyboard,
    Tap,
}

impl Interaction {
    pub const ALL: [Interaction; 7] = [
        Interaction::Dragging,
        Interaction::TouchZoom,
        Interaction::DoubleClickZoom,
        Interaction::ScrollWheelZoom,
        Interaction::BoxZoom,
        Interaction::Keyboard,
        Interaction::Tap,
    ];
}

/// A map renderer
///
/// Calls with handles the surface does not know are ignored.
pub trait MapSurface {
    /// Create an empty, detached layer
    fn create_layer(&mut self, name: &str, clustered: bool) -> LayerHandle;
    /// Show the layer in the view
    fn attach_layer(&mut self, layer: LayerHandle);
    /// Hide the layer from the view, keeping its content
    fn detach_layer(&mut self, layer: LayerHandle);
    /// List the layer as a toggleable overlay in the layer control
    fn register_overlay(&mut self, layer: LayerHandle, name: &str);

    fn add_to_layer(&mut self, layer: LayerHandle, entity: EntityHandle);
    fn remove_from_layer(&mut self, layer: LayerHandle, entity: EntityHandle);
    /// Empty the layer's display list without destroying entities
    fn clear_layer(&mut self, layer: LayerHandle);
    /// Release the layer and its overlay entry; the handle must not be used afterwards
    fn remove_layer(&mut self, layer: LayerHandle);

    fn create_marker(
        &mut self,
        position: Point<f64>,
        icon: &IconSpec,
        tooltip: Option<&Tooltip>,
    ) -> EntityHandle;
    fn create_area(&mut self, polygon: &Polygon<f64>, style: &AreaStyle) -> EntityHandle;
    fn create_polyline(&mut self, points: &[Point<f64>], style: &LineStyle) -> EntityHandle;
    fn set_icon(&mut self, entity: EntityHandle, icon: &IconSpec);
    /// Release an entity; it must not be used afterwards
    fn destroy(&mut self, entity: EntityHandle);

    fn set_interaction(&mut self, interaction: Interaction, enabled: bool);
    fn pan_to(&mut self, center: Point<f64>);
    fn set_zoom(&mut self, zoom: f64);
    fn fit_bounds(&mut self, bounds: Rect<f64>);
    fn select_base_layer(&mut self, layer: &BaseLayer);
}
