//! UI panels for the application
//!
//! Sidebar with the Layers and Navigation tabs, the buttons overlaid on the map and the
//! map's context menu.

use crate::app::state::{AppState, SidebarTab};
use egui::{Color32, RichText, Ui};
use worldmap2d_lib::ContextAction;
use worldmap2d_lib::geodesy::format_distance;
use worldmap2d_lib::navigation::{PickTarget, Stop};

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open { "✕" } else { "☰" };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// `+`/`-` buttons in the top-left corner. Returns the requested zoom change.
pub fn zoom_buttons(ui: &mut Ui) -> Option<f64> {
    let size = egui::vec2(32.0, 32.0);
    let origin = ui.max_rect().left_top() + egui::vec2(10.0, 10.0);

    let zoom_in = ui.put(
        egui::Rect::from_min_size(origin, size),
        egui::Button::new(RichText::new("➕").size(16.0)),
    );
    let zoom_out = ui.put(
        egui::Rect::from_min_size(origin + egui::vec2(0.0, size.y + 4.0), size),
        egui::Button::new(RichText::new("➖").size(16.0)),
    );

    if zoom_in.clicked() {
        Some(1.0)
    } else if zoom_out.clicked() {
        Some(-1.0)
    } else {
        None
    }
}

/// Measured distance, shown at the top of the map while measuring
pub fn measurement_readout(ui: &mut Ui, state: &AppState) {
    if !state.measurement.active {
        return;
    }
    let text = match state.measurement.points.len() {
        0 => "📏 Click the map to start measuring".to_string(),
        1 => "📏 Click the next point".to_string(),
        _ => format!("📏 {}", format_distance(state.measurement.meters())),
    };
    let painter = ui.painter();
    let anchor = ui.max_rect().center_top() + egui::vec2(0.0, 12.0);
    let galley = painter.layout_no_wrap(text, egui::FontId::proportional(15.0), Color32::BLACK);
    let rect = egui::Rect::from_center_size(
        anchor + egui::vec2(0.0, galley.size().y / 2.0 + 4.0),
        galley.size() + egui::vec2(16.0, 8.0),
    );
    painter.rect_filled(rect, 5.0, Color32::from_white_alpha(220));
    painter.galley(rect.min + egui::vec2(8.0, 4.0), galley, Color32::BLACK);
}

/// Context menu opened with a secondary click on the map
pub fn context_menu(ctx: &egui::Context, state: &mut AppState) {
    let Some(menu) = state.context_menu else {
        return;
    };
    if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        state.context_menu = None;
        return;
    }

    let mut chosen = None;
    egui::Area::new(egui::Id::new("map_context_menu"))
        .fixed_pos(menu.screen)
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.label(
                    RichText::new(format!("{:.5}, {:.5}", menu.position.y(), menu.position.x()))
                        .small()
                        .weak(),
                );
                ui.separator();
                if ui.button("📋 Copy coordinates").clicked() {
                    chosen = Some(ContextAction::CopyCoordinates);
                }
                if ui.button("🎯 Center map here").clicked() {
                    chosen = Some(ContextAction::CenterMap);
                }
                if ui.button("➕ Zoom in").clicked() {
                    chosen = Some(ContextAction::ZoomIn);
                }
                if ui.button("➖ Zoom out").clicked() {
                    chosen = Some(ContextAction::ZoomOut);
                }
            });
        });

    if let Some(action) = chosen {
        if let Some(text) = state.map.context_action(action, menu.position) {
            ctx.copy_text(text);
        }
        state.context_menu = None;
    }
}

/// Render the main sidebar (responsive: side on landscape, bottom on portrait)
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    let screen_size = ctx.viewport_rect().size();
    if screen_size.y > screen_size.x {
        egui::TopBottomPanel::bottom("main_sidebar")
            .default_height(280.0)
            .min_height(180.0)
            .max_height(ctx.viewport_rect().height() * 0.6)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state));
    } else {
        egui::SidePanel::right("main_sidebar")
            .default_width(300.0)
            .min_width(260.0)
            .max_width(450.0)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state));
    }
}

fn render_sidebar_content(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.selectable_value(&mut state.ui_settings.active_tab, SidebarTab::Layers, "🗺 Layers");
        ui.selectable_value(
            &mut state.ui_settings.active_tab,
            SidebarTab::Navigation,
            "🧭 Navigation",
        );
        if state.tasks.in_flight() > 0 {
            ui.spinner();
        }
    });

    ui.separator();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| match state.ui_settings.active_tab {
            SidebarTab::Layers => render_layers_tab(ui, state),
            SidebarTab::Navigation => render_navigation_tab(ui, state),
        });
}

fn render_messages(ui: &mut Ui, state: &mut AppState) {
    if state.messages.is_empty() {
        return;
    }
    egui::ScrollArea::vertical()
        .id_salt("messages_scroll")
        .max_height(100.0)
        .show(ui, |ui| {
            for message in &state.messages {
                let color = if message.is_error { Color32::RED } else { ui.visuals().text_color() };
                ui.label(RichText::new(format!("• {}", message.text)).small().color(color));
            }
        });
    if ui.button("Clear Messages").clicked() {
        state.messages.clear();
    }
    ui.separator();
}

/// Render the Layers tab
fn render_layers_tab(ui: &mut Ui, state: &mut AppState) {
    render_messages(ui, state);

    ui.label(RichText::new("Layers").strong());
    let layers: Vec<(String, bool, usize)> = state
        .map
        .registry()
        .layers()
        .into_iter()
        .map(|layer| (layer.name.clone(), layer.displayed, layer.shown_count()))
        .collect();
    if layers.is_empty() {
        ui.label(RichText::new("No records yet").weak());
    }
    for (name, displayed, shown) in layers {
        let mut checked = displayed;
        if ui.checkbox(&mut checked, format!("{name} ({shown})")).changed() {
            state.map.set_layer_displayed(&name, checked);
        }
    }

    ui.add_space(8.0);
    let base_layers: Vec<String> = state.map.config().base_layers.iter().map(|layer| layer.name.clone()).collect();
    if base_layers.len() > 1 {
        let current = state.ui_settings.base_layer.clone().unwrap_or_default();
        let mut selected = current.clone();
        egui::ComboBox::from_label("Base layer")
            .selected_text(selected.as_str())
            .show_ui(ui, |ui| {
                for name in &base_layers {
                    ui.selectable_value(&mut selected, name.clone(), name.as_str());
                }
            });
        if selected != current {
            state.select_base_layer(&selected);
        }
    }

    ui.separator();
    ui.label(RichText::new(format!("Filter by '{}'", state.map.config().filter_attr.as_str())).strong());
    ui.horizontal(|ui| {
        let active = ui.checkbox(&mut state.ui_settings.filter_active, "");
        let value = ui.text_edit_singleline(&mut state.ui_settings.filter_value);
        if active.changed() || value.lost_focus() {
            state.apply_filter();
        }
    });

    ui.separator();
    ui.label(RichText::new("Interaction").strong());
    let interaction = state.map.interaction_state();
    let mut clicks = interaction.map_click_interaction;
    if ui.checkbox(&mut clicks, "Map clicks").changed() {
        state.map.toggle_click_interaction();
    }
    let mut gestures = interaction.map_interactions;
    if ui.checkbox(&mut gestures, "Pan, zoom and marker clicks").changed() {
        if gestures {
            state.map.enable_all_interactions();
        } else {
            state.map.disable_all_interactions();
        }
    }
    ui.horizontal(|ui| {
        if state.map.config().show_measuring_tool {
            let label = if state.measurement.active { "📏 Stop measuring" } else { "📏 Measure" };
            if ui.button(label).clicked() {
                state.toggle_measurement();
            }
        }
        if ui.button("📍 I am here").on_hover_text("Use the map center as your position").clicked() {
            state.locate_at_view_center();
        }
    });
    if let Some(user) = state.map.user_position() {
        ui.label(
            RichText::new(format!("Your position: {:.5}, {:.5}", user.position.y(), user.position.x()))
                .small(),
        );
    }

    render_models_section(ui, state);
    render_selected_section(ui, state);
}

fn render_models_section(ui: &mut Ui, state: &mut AppState) {
    let allow_add = state.map.config().allow_add_models;
    if state.map.model_files().is_empty() && !allow_add {
        return;
    }
    ui.separator();
    ui.label(RichText::new("Model files").strong());

    let names: Vec<String> = state.map.model_files().iter().map(|file| file.name.clone()).collect();
    let mut to_remove = None;
    for name in names {
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("📄 {name}")).small());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("🗑").clicked() {
                    to_remove = Some(name.clone());
                }
            });
        });
    }
    if let Some(name) = to_remove {
        state.map.remove_model_file(&name);
    }

    if allow_add {
        egui::Grid::new("model_form").num_columns(2).show(ui, |ui| {
            ui.label("Name");
            ui.text_edit_singleline(&mut state.ui_settings.model_name);
            ui.end_row();
            ui.label("URL");
            ui.text_edit_singleline(&mut state.ui_settings.model_url);
            ui.end_row();
        });
        if ui.button("➕ Add model file").clicked() {
            state.add_model_file();
        }
    }
}

fn render_selected_section(ui: &mut Ui, state: &mut AppState) {
    let Some(record) = state.selected.clone() else {
        return;
    };
    ui.separator();
    ui.horizontal(|ui| {
        ui.label(RichText::new(format!("Selected: {}", record.key())).strong());
        if ui.small_button("🎯").on_hover_text("Zoom to").clicked() {
            state.map.zoom_to_key(record.key());
        }
    });
    egui::Grid::new("selected_record")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            for (name, value) in record.fields() {
                ui.label(RichText::new(name).small());
                let text = match value {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                ui.label(RichText::new(text).small());
                ui.end_row();
            }
        });
}

/// Render the Navigation tab
fn render_navigation_tab(ui: &mut Ui, state: &mut AppState) {
    render_messages(ui, state);

    let open = state.navigation.is_menu_open();
    let label = if open { "✕ Close navigation" } else { "🧭 Open navigation" };
    if ui.button(label).clicked() {
        state.toggle_navigation_menu();
    }
    if !open {
        ui.label(
            RichText::new("While navigation is open, map clicks fill the selected input and marker clicks fill start and destination.")
                .small()
                .weak(),
        );
        return;
    }
    ui.add_space(8.0);

    let planner = state.navigation.planner().clone();
    let active = planner.active_input();

    stop_row(ui, state, "Start", PickTarget::Start, planner.start(), active);
    search_row(ui, state, PickTarget::Start);

    let mut remove = None;
    for (index, stop) in planner.waypoints().iter().enumerate() {
        ui.horizontal(|ui| {
            pick_button(ui, state, PickTarget::Waypoint(index), active);
            ui.label(stop_text(&format!("Stop {}", index + 1), stop));
            if ui.small_button("🗑").clicked() {
                remove = Some(index);
            }
        });
    }
    if let Some(index) = remove {
        state.navigation.planner_mut().remove_waypoint(index);
    }
    if ui.small_button("➕ Add stop").clicked() {
        state.navigation.planner_mut().add_waypoint();
    }

    stop_row(ui, state, "Destination", PickTarget::Destination, planner.destination(), active);
    search_row(ui, state, PickTarget::Destination);

    ui.add_space(8.0);
    ui.horizontal_wrapped(|ui| {
        if ui.button("⇅ Swap").clicked() {
            state.navigation.planner_mut().swap_start_destination();
        }
        if ui.button("📍 My location").clicked() {
            state.use_user_location();
        }
        if ui.button("🚀 Route").clicked() {
            state.compute_route();
        }
        if ui.button("⏹ Stop").clicked() {
            state.stop_navigation();
        }
    });
    ui.horizontal_wrapped(|ui| {
        if ui.button("💾 Export GPX").clicked() {
            state.export_route();
        }
        if state.navigation.config().enable_route_save && ui.button("☁ Save route").clicked() {
            state.save_route();
        }
    });

    if let Some(plan) = planner.plan() {
        ui.separator();
        ui.label(RichText::new(format!("Route: {}", format_distance(plan.distance_m))).strong());
        egui::Grid::new("instructions")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for instruction in &plan.instructions {
                    ui.label(RichText::new(&instruction.text).small());
                    ui.label(RichText::new(format_distance(instruction.distance_m)).small().weak());
                    ui.end_row();
                }
            });
    }
}

fn stop_text(name: &str, stop: &Stop) -> RichText {
    if stop.position.is_some() {
        RichText::new(format!("{name}: {}", stop.label))
    } else {
        RichText::new(format!("{name}: not set")).weak()
    }
}

fn pick_button(ui: &mut Ui, state: &mut AppState, target: PickTarget, active: Option<PickTarget>) {
    let picking = active == Some(target);
    if ui
        .selectable_label(picking, "📌")
        .on_hover_text("Pick on the map")
        .clicked()
    {
        let next = if picking { None } else { Some(target) };
        state.navigation.planner_mut().set_active_input(next);
    }
}

fn stop_row(ui: &mut Ui, state: &mut AppState, name: &str, target: PickTarget, stop: &Stop, active: Option<PickTarget>) {
    ui.horizontal(|ui| {
        pick_button(ui, state, target, active);
        ui.label(stop_text(name, stop));
        if stop.position.is_some() && ui.small_button("✕").clicked() {
            state.navigation.planner_mut().clear_input(target);
        }
    });
}

fn search_row(ui: &mut Ui, state: &mut AppState, target: PickTarget) {
    ui.horizontal(|ui| {
        let query = match target {
            PickTarget::Start => &mut state.ui_settings.search_start,
            PickTarget::Destination => &mut state.ui_settings.search_destination,
            PickTarget::Waypoint(_) => return,
        };
        let edit = ui.add(egui::TextEdit::singleline(query).hint_text("Search a place").desired_width(180.0));
        let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if ui.small_button("🔍").clicked() || submitted {
            state.search(target);
        }
    });
}
