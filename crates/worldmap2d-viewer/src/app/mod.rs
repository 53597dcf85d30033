//! Application module
//!
//! This module provides the main application structure:
//! - Full-screen map view drawing the scene of the map component
//! - Toggleable sidebar with tabs (Layers and Navigation)
//! - Context menu, zoom buttons and keyboard panning on the map
//! - Base layer tiles built from the configured url templates

mod plugin;
pub mod settings;
mod state;
mod surface;
mod tasks;
mod ui_panels;

use crate::ViewerError;
use crate::app::plugin::{PluginShared, ScenePlugin};
use crate::app::settings::Settings;
use crate::app::state::{AppState, SidebarTab};
use crate::app::surface::SharedScene;
use eframe::egui;
use walkers::{
    HttpTiles, Map, MapMemory, TileId,
    sources::{Attribution, TileSource},
};
use worldmap2d_lib::Interaction;
use worldmap2d_lib::config::BaseLayer;

/// Tiles whose url is a `{s}`/`{z}`/`{x}`/`{y}` template
pub struct TemplateTiles {
    url: String,
    max_zoom: u8,
}

impl TemplateTiles {
    pub fn new(layer: &BaseLayer, max_zoom: u8) -> Self {
        Self {
            url: layer.url.clone(),
            max_zoom,
        }
    }
}

impl TileSource for TemplateTiles {
    fn tile_url(&self, tile_id: TileId) -> String {
        let subdomain = ["a", "b", "c"][((tile_id.x + tile_id.y) % 3) as usize];
        self.url
            .replace("{s}", subdomain)
            .replace("{z}", &tile_id.zoom.to_string())
            .replace("{x}", &tile_id.x.to_string())
            .replace("{y}", &tile_id.y.to_string())
    }

    fn attribution(&self) -> Attribution {
        // The configured attribution is painted by the app
        Attribution {
            text: "",
            url: "",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}

/// Persisted settings (UI only, no records)
#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedSettings {
    sidebar_open: bool,
    active_tab: String,
    base_layer: Option<String>,
}

/// Main application structure
pub struct WorldmapApp {
    state: AppState,
    scene: SharedScene,
    plugin_shared: PluginShared,
    /// Tiles of the active base layer, with its name
    tiles: Option<(String, HttpTiles)>,
    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,
}

impl WorldmapApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings) -> Result<Self, ViewerError> {
        let scene = SharedScene::default();
        let mut state = AppState::new(&settings, scene.clone(), cc.egui_ctx.clone())?;

        if let Some(storage) = cc.storage {
            restore_settings(storage, &mut state);
        }

        tracing::info!(
            "Initialized with {} record(s) in {} layer(s)",
            state.map.registry().len(),
            state.map.registry().layers().len()
        );

        Ok(Self {
            state,
            scene,
            plugin_shared: PluginShared::default(),
            tiles: None,
            map_memory: MapMemory::default(),
        })
    }

    /// Move the walkers camera where the component asked for
    fn apply_pending_view(&mut self) {
        let view = self.scene.write().take_pending_view();
        if let Some(center) = view.center {
            self.map_memory.center_at(walkers::lat_lon(center.y(), center.x()));
        }
        if let Some(zoom) = view.zoom {
            let _ = self.map_memory.set_zoom(zoom);
        }
    }

    /// Rebuild the tiles when the component selected another base layer
    fn sync_tiles(&mut self, ctx: &egui::Context) {
        let Some(layer) = self.scene.read().base_layer().cloned() else {
            return;
        };
        if self.tiles.as_ref().is_some_and(|(name, _)| *name == layer.name) {
            return;
        }
        tracing::info!("Base layer '{}' from {}", layer.name, layer.url);
        let max_zoom = self.state.map.config().max_zoom.clamp(0.0, 19.0) as u8;
        let tiles = HttpTiles::new(TemplateTiles::new(&layer, max_zoom), ctx.clone());
        self.tiles = Some((layer.name, tiles));
    }

    /// Arrow keys pan by a quarter of the view, `+`/`-` zoom
    fn keyboard_controls(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() || !self.scene.read().is_enabled(Interaction::Keyboard) {
            return;
        }
        let (dx, dy, dz) = ctx.input(|i| {
            let mut delta = (0.0, 0.0, 0.0);
            if i.key_pressed(egui::Key::ArrowLeft) {
                delta.0 -= 1.0;
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                delta.0 += 1.0;
            }
            if i.key_pressed(egui::Key::ArrowUp) {
                delta.1 += 1.0;
            }
            if i.key_pressed(egui::Key::ArrowDown) {
                delta.1 -= 1.0;
            }
            if i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals) {
                delta.2 += 1.0;
            }
            if i.key_pressed(egui::Key::Minus) {
                delta.2 -= 1.0;
            }
            delta
        });

        if (dx != 0.0 || dy != 0.0)
            && let Some(bounds) = self.state.last_bounds()
        {
            let center = bounds.center();
            self.map_memory.center_at(walkers::lat_lon(
                center.y + dy * bounds.height() / 4.0,
                center.x + dx * bounds.width() / 4.0,
            ));
        }
        if dz != 0.0 {
            let _ = self.map_memory.set_zoom(self.map_memory.zoom() + dz);
        }
    }
}

fn restore_settings(storage: &dyn eframe::Storage, state: &mut AppState) {
    let Some(settings) = storage
        .get_string("persisted_settings")
        .and_then(|json| serde_json::from_str::<PersistedSettings>(&json).ok())
    else {
        tracing::info!("No persisted settings found, starting fresh");
        return;
    };
    state.ui_settings.sidebar_open = settings.sidebar_open;
    state.ui_settings.active_tab = match settings.active_tab.as_str() {
        "Navigation" => SidebarTab::Navigation,
        _ => SidebarTab::Layers,
    };
    if let Some(name) = settings.base_layer {
        state.select_base_layer(&name);
    }
    tracing::info!("Restored settings");
}

#[profiling::all_functions]
impl eframe::App for WorldmapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.process_task_results();
        self.apply_pending_view();
        self.sync_tiles(ctx);
        self.keyboard_controls(ctx);

        ui_panels::render_sidebar(ctx, &mut self.state);

        let (drag_enabled, zoom_enabled) = {
            let scene = self.scene.read();
            (
                scene.is_enabled(Interaction::Dragging),
                scene.is_enabled(Interaction::ScrollWheelZoom)
                    && scene.is_enabled(Interaction::TouchZoom)
                    && scene.is_enabled(Interaction::DoubleClickZoom),
            )
        };
        let attribution_text = if self.state.map.config().attribution_control {
            self.scene.read().base_layer().map(|layer| layer.attribution.clone())
        } else {
            None
        };
        let my_position = {
            let config = self.state.map.config();
            walkers::lat_lon(config.start_lat, config.start_lon)
        };

        // Central panel: Map view (full screen)
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let plugin = ScenePlugin::new(self.scene.clone(), self.plugin_shared.clone());
                let before = (self.map_memory.detached(), self.map_memory.zoom());

                let map = match self.tiles.as_mut() {
                    Some((_, tiles)) => Map::new(Some(tiles), &mut self.map_memory, my_position),
                    None => Map::new(None, &mut self.map_memory, my_position),
                }
                .with_plugin(plugin);
                ui.add(map);

                // Undo gestures the component has disabled
                if !drag_enabled
                    && self.map_memory.detached() != before.0
                    && let Some(center) = before.0
                {
                    self.map_memory.center_at(center);
                }
                if !zoom_enabled && self.map_memory.zoom() != before.1 {
                    let _ = self.map_memory.set_zoom(before.1);
                }

                if self.state.map.config().zoom_control
                    && let Some(delta) = ui_panels::zoom_buttons(ui)
                {
                    let _ = self.map_memory.set_zoom(self.map_memory.zoom() + delta);
                }

                ui_panels::sidebar_toggle_button(ui, &mut self.state);
                ui_panels::measurement_readout(ui, &self.state);

                if let Some(text) = &attribution_text {
                    let painter = ui.painter();
                    let screen_rect = ui.max_rect();
                    painter.text(
                        screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                        egui::Align2::CENTER_BOTTOM,
                        text,
                        egui::FontId::proportional(10.0),
                        egui::Color32::from_black_alpha(180),
                    );
                }
            });

        ui_panels::context_menu(ctx, &mut self.state);

        let inputs = self.plugin_shared.take_inputs();
        self.state.process_plugin_inputs(inputs);
        self.state
            .process_view(self.plugin_shared.last_view(), self.map_memory.zoom());

        if self.scene.read().has_pending_view() {
            ctx.request_repaint();
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            sidebar_open: self.state.ui_settings.sidebar_open,
            active_tab: format!("{:?}", self.state.ui_settings.active_tab),
            base_layer: self.tiles.as_ref().map(|(name, _)| name.clone()),
        };
        if let Ok(json) = serde_json::to_string(&settings) {
            storage.set_string("persisted_settings", json);
            tracing::debug!("Saved settings on exit");
        }
    }
}
