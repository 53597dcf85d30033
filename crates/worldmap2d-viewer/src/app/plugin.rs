//! Walkers plugin drawing the scene on the map
//!
//! The plugin paints every attached layer of the [`SharedScene`] (areas first, then
//! polylines, then markers), shows marker tooltips on hover and reports clicks and the
//! visible bounds back to the app through [`PluginShared`].

use crate::app::surface::{SceneEntity, SharedScene};
use egui::{Color32, FontId, Pos2, Shape, Stroke};
use geo::{Point, Rect, coord};
use std::sync::{Arc, Mutex, PoisonError};
use walkers::{Plugin, Projector};
use worldmap2d_lib::{EntityHandle, IconSpec, Tooltip};

/// Pointer distance in pixels that still counts as a click on a marker
const HIT_RADIUS: f32 = 12.0;
const MARKER_RADIUS: f32 = 7.0;
/// Markers of a clustered layer closer than this (in pixels) are drawn as one bubble
const CLUSTER_RADIUS: f32 = 40.0;
const CLUSTER_BUBBLE_RADIUS: f32 = 14.0;
const DEFAULT_MARKER_COLOR: Color32 = Color32::from_rgb(42, 129, 203);

/// Input the plugin saw, handled by the app after the frame
#[derive(Debug, Clone, PartialEq)]
pub enum PluginInput {
    MapClick(Point<f64>),
    MarkerClick(EntityHandle),
    /// Click on a bubble of clustered markers, at the bubble's center
    ClusterClick(Point<f64>),
    ContextMenu { screen: Pos2, position: Point<f64> },
}

/// Visible area of the last frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSnapshot {
    /// `x = lon`, `y = lat`
    pub bounds: Rect<f64>,
    /// Whether a pointer button was held, i.e. the view may still be moving
    pub pointer_down: bool,
}

/// State shared between the plugin (recreated every frame) and the app
#[derive(Debug, Clone, Default)]
pub struct PluginShared {
    inbox: Arc<Mutex<Vec<PluginInput>>>,
    view: Arc<Mutex<Option<ViewSnapshot>>>,
}

impl PluginShared {
    fn push(&self, input: PluginInput) {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner).push(input);
    }

    /// Inputs reported since the last call
    pub fn take_inputs(&self) -> Vec<PluginInput> {
        std::mem::take(&mut *self.inbox.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn last_view(&self) -> Option<ViewSnapshot> {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_view(&self, snapshot: ViewSnapshot) {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

/// Plugin for rendering the scene
pub struct ScenePlugin {
    scene: SharedScene,
    shared: PluginShared,
}

impl ScenePlugin {
    pub fn new(scene: SharedScene, shared: PluginShared) -> Self {
        Self { scene, shared }
    }
}

fn to_screen(projector: &Projector, position: Point<f64>) -> Pos2 {
    let screen = projector.project(walkers::lat_lon(position.y(), position.x()));
    Pos2::new(screen.x, screen.y)
}

fn to_world(projector: &Projector, screen: Pos2) -> Point<f64> {
    let position = projector.unproject(screen.to_vec2());
    Point::new(position.x(), position.y())
}

fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let [r, g, b, _] = color.to_array();
    Color32::from_rgba_unmultiplied(r, g, b, (opacity.clamp(0.0, 1.0) * 255.0) as u8)
}

/// Parse `#rrggbb`, `rrggbb`, `#rgb` or a few common color names
pub fn parse_color(raw: &str) -> Option<Color32> {
    let raw = raw.trim();
    let hex = raw.trim_start_matches('#');
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    if hex.chars().all(|c| c.is_ascii_hexdigit()) {
        match hex.len() {
            6 => return Some(Color32::from_rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                return Some(Color32::from_rgb(expand(0)?, expand(1)?, expand(2)?));
            }
            _ => {}
        }
    }
    let named = match raw.to_ascii_lowercase().as_str() {
        "red" => Color32::from_rgb(255, 0, 0),
        "green" => Color32::from_rgb(0, 128, 0),
        "blue" => Color32::from_rgb(0, 0, 255),
        "orange" => Color32::from_rgb(255, 165, 0),
        "yellow" => Color32::from_rgb(255, 255, 0),
        "violet" | "purple" => Color32::from_rgb(128, 0, 128),
        "black" => Color32::BLACK,
        "white" => Color32::WHITE,
        "grey" | "gray" => Color32::from_rgb(123, 123, 123),
        "sienna" => Color32::from_rgb(160, 82, 45),
        "brown" => Color32::from_rgb(165, 42, 42),
        _ => return None,
    };
    Some(named)
}

/// Group screen positions greedily: each point joins the first group whose seed is within
/// `radius`, otherwise it starts a new group. Returns indices into `points`.
pub fn cluster_points(points: &[Pos2], radius: f32) -> Vec<Vec<usize>> {
    let mut groups: Vec<(Pos2, Vec<usize>)> = Vec::new();
    for (index, point) in points.iter().enumerate() {
        match groups.iter_mut().find(|(seed, _)| seed.distance(*point) <= radius) {
            Some((_, members)) => members.push(index),
            None => groups.push((*point, vec![index])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

fn draw_cluster(painter: &egui::Painter, center: Pos2, count: usize) {
    painter.circle_filled(center, CLUSTER_BUBBLE_RADIUS + 4.0, with_opacity(DEFAULT_MARKER_COLOR, 0.35));
    painter.circle_filled(center, CLUSTER_BUBBLE_RADIUS, DEFAULT_MARKER_COLOR);
    painter.text(
        center,
        egui::Align2::CENTER_CENTER,
        count.to_string(),
        FontId::proportional(12.0),
        Color32::WHITE,
    );
}

/// Tooltip content as plain text: `<br>` becomes a newline, other tags are dropped
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close].trim().trim_end_matches('/').trim();
        if tag.eq_ignore_ascii_case("br") {
            out.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn draw_marker(painter: &egui::Painter, center: Pos2, icon: &IconSpec) {
    match icon.url.as_str() {
        "pulse" => {
            let t = painter.ctx().input(|i| i.time) as f32;
            let phase = (t * 2.0).fract();
            painter.circle_filled(center, 5.0, DEFAULT_MARKER_COLOR);
            painter.circle_stroke(
                center,
                5.0 + phase * 10.0,
                Stroke::new(2.0, with_opacity(DEFAULT_MARKER_COLOR, 1.0 - phase)),
            );
            painter.ctx().request_repaint();
        }
        "user-location" => {
            if let Some(heading) = icon.rotation {
                let angle = (heading as f32).to_radians();
                let tip = center + egui::vec2(angle.sin(), -angle.cos()) * 16.0;
                painter.line_segment([center, tip], Stroke::new(3.0, DEFAULT_MARKER_COLOR));
            }
            painter.circle_filled(center, 8.0, DEFAULT_MARKER_COLOR);
            painter.circle_stroke(center, 8.0, Stroke::new(2.0, Color32::WHITE));
        }
        _ => {
            let fill = icon
                .color
                .as_ref()
                .and_then(|color| parse_color(color.as_str()))
                .unwrap_or(DEFAULT_MARKER_COLOR);
            painter.circle_filled(center, MARKER_RADIUS, fill);
            painter.circle_stroke(center, MARKER_RADIUS, Stroke::new(1.5, Color32::from_black_alpha(200)));
            painter.circle_filled(center, 2.0, Color32::WHITE);
        }
    }
}

fn draw_tooltip(painter: &egui::Painter, anchor: Pos2, tooltip: &Tooltip) {
    let text = plain_text(&tooltip.content);
    if text.trim().is_empty() {
        return;
    }
    let galley = painter.layout_no_wrap(text, FontId::proportional(13.0), Color32::BLACK);
    let [dx, dy] = tooltip.options.offset;
    let size = galley.size() + egui::vec2(12.0, 8.0);
    let anchor = anchor + egui::vec2(dx as f32, dy as f32);
    let min = match tooltip.options.direction.as_str() {
        "bottom" => anchor + egui::vec2(-size.x / 2.0, 0.0),
        "left" => anchor + egui::vec2(-size.x, -size.y / 2.0),
        "right" => anchor + egui::vec2(0.0, -size.y / 2.0),
        _ => anchor + egui::vec2(-size.x / 2.0, -size.y),
    };
    let rect = egui::Rect::from_min_size(min, size);
    painter.rect_filled(rect, 4.0, with_opacity(Color32::WHITE, tooltip.options.opacity));
    painter.galley(rect.min + egui::vec2(6.0, 4.0), galley, Color32::BLACK);
}

impl Plugin for ScenePlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("ScenePlugin::run");

        let painter = ui.painter();
        let scene = self.scene.read();
        let hover = response.hover_pos();

        let mut areas = Vec::new();
        let mut lines = Vec::new();
        let mut markers = Vec::new();
        let mut clusters = Vec::new();
        for layer in scene.visible_layers() {
            let mut layer_markers = Vec::new();
            for handle in &layer.members {
                match scene.entity(*handle) {
                    Some(SceneEntity::Area { polygon, style }) => areas.push((polygon, style)),
                    Some(SceneEntity::Polyline { points, style }) => lines.push((points, style)),
                    Some(SceneEntity::Marker { position, icon, tooltip }) => {
                        layer_markers.push((*handle, to_screen(projector, *position), icon, tooltip.as_ref()))
                    }
                    None => {}
                }
            }

            if !layer.clustered {
                markers.extend(layer_markers);
                continue;
            }
            let centers: Vec<Pos2> = layer_markers.iter().map(|(_, center, _, _)| *center).collect();
            for group in cluster_points(&centers, CLUSTER_RADIUS) {
                if let [single] = group.as_slice() {
                    markers.push(layer_markers[*single]);
                } else {
                    let sum = group.iter().fold(egui::Vec2::ZERO, |sum, i| sum + centers[*i].to_vec2());
                    clusters.push(((sum / group.len() as f32).to_pos2(), group.len()));
                }
            }
        }

        {
            profiling::scope!("areas");
            for (polygon, style) in areas {
                let color = parse_color(&style.color).unwrap_or(Color32::RED);
                let points: Vec<Pos2> = polygon
                    .exterior()
                    .points()
                    .map(|point| to_screen(projector, point))
                    .collect();
                if points.len() >= 3 {
                    painter.add(Shape::convex_polygon(
                        points,
                        with_opacity(color, style.fill_opacity),
                        Stroke::new(2.0, color),
                    ));
                }
            }
        }

        {
            profiling::scope!("polylines");
            for (points, style) in lines {
                let color = parse_color(&style.color).unwrap_or(Color32::RED);
                let screen: Vec<Pos2> = points.iter().map(|point| to_screen(projector, *point)).collect();
                if screen.len() >= 2 {
                    painter.add(Shape::line(screen, Stroke::new(style.weight, with_opacity(color, style.opacity))));
                }
            }
        }

        let nearest = |pointer: Pos2| {
            markers
                .iter()
                .rev()
                .filter(|(_, center, _, _)| center.distance(pointer) <= HIT_RADIUS)
                .min_by(|a, b| a.1.distance(pointer).total_cmp(&b.1.distance(pointer)))
        };

        {
            profiling::scope!("markers");
            for (_, center, icon, _) in &markers {
                draw_marker(painter, *center, icon);
            }
            for (center, count) in &clusters {
                draw_cluster(painter, *center, *count);
            }
            if let Some((_, center, _, Some(tooltip))) = hover.and_then(nearest) {
                draw_tooltip(painter, *center, tooltip);
            }
        }

        if response.clicked()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            let cluster = clusters
                .iter()
                .find(|(center, _)| center.distance(pointer) <= CLUSTER_BUBBLE_RADIUS);
            let input = match (cluster, nearest(pointer)) {
                (Some((center, _)), _) => PluginInput::ClusterClick(to_world(projector, *center)),
                (None, Some((handle, _, _, _))) => PluginInput::MarkerClick(*handle),
                (None, None) => PluginInput::MapClick(to_world(projector, pointer)),
            };
            self.shared.push(input);
        }
        if response.secondary_clicked()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.shared.push(PluginInput::ContextMenu {
                screen: pointer,
                position: to_world(projector, pointer),
            });
        }

        let rect = response.rect;
        let top_left = to_world(projector, rect.min);
        let bottom_right = to_world(projector, rect.max);
        self.shared.set_view(ViewSnapshot {
            bounds: Rect::new(
                coord! { x: top_left.x(), y: top_left.y() },
                coord! { x: bottom_right.x(), y: bottom_right.y() },
            ),
            pointer_down: ui.input(|i| i.pointer.any_down()),
        });
    }
}
