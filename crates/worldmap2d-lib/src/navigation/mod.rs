//! Navigation plugin
//!
//! Plans a route from a start through optional waypoints to a destination. While the
//! navigation menu is open, its own click handlers are installed through the interaction
//! gate: map clicks fill the active input and marker clicks fill the start or destination.
//! Routing and reverse geocoding are remote; this module prepares the requests and applies
//! their results, the caller runs them.
//!
//! With `create_route_from_data`, records are additionally chained into a track as they
//! arrive (see [`RouteChain`]).

mod chain;
mod export;
mod planner;

pub use chain::{ChainStep, RouteChain};
pub use export::{export_gpx, route_id_now, route_points_for_saving, route_to_gpx, save_route};
pub use planner::{
    LabelRequest, MAP_PIN_LABEL, NavigationPlanner, PickTarget, Stop, USER_LOCATION_LABEL, coordinate_label,
};

use crate::capability::{RoutePlan, RoutePointRecord};
use crate::config::NavigationConfig;
use crate::surface::{EntityHandle, IconSpec, LineStyle, MapSurface};
use crate::{ClickHandlerSet, EventBus, GeoFeature, MapError, Record, Result, Worldmap2d};
use geo::Point;
use std::sync::mpsc::{Receiver, Sender, channel};

/// A click captured by the navigation handlers, applied on the next [`Navigation::process_clicks`]
#[derive(Debug, Clone)]
enum Pick {
    Map(Point<f64>),
    Marker(Record),
}

/// Click handlers installed while the navigation menu is open
struct NavigationClicks {
    picks: Sender<Pick>,
}

impl ClickHandlerSet for NavigationClicks {
    fn name(&self) -> &str {
        "navigation"
    }

    fn on_map_click(&mut self, position: Point<f64>, _events: &mut EventBus) {
        if self.picks.send(Pick::Map(position)).is_err() {
            tracing::debug!("Navigation is gone, map click dropped");
        }
    }

    fn on_marker_click(&mut self, record: &Record, _events: &mut EventBus) {
        if self.picks.send(Pick::Marker(record.clone())).is_err() {
            tracing::debug!("Navigation is gone, marker click dropped");
        }
    }
}

/// Navigation plugin state attached to one map
pub struct Navigation {
    config: NavigationConfig,
    planner: NavigationPlanner,
    chain: RouteChain,
    menu_open: bool,
    picks_tx: Sender<Pick>,
    picks_rx: Receiver<Pick>,
    overlays: Vec<EntityHandle>,
}

impl std::fmt::Debug for Navigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigation")
            .field("planner", &self.planner)
            .field("menu_open", &self.menu_open)
            .field("overlays", &self.overlays.len())
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Navigation {
    pub fn new(config: NavigationConfig) -> Self {
        let (picks_tx, picks_rx) = channel();
        Self {
            config,
            planner: NavigationPlanner::new(),
            chain: RouteChain::new(),
            menu_open: false,
            picks_tx,
            picks_rx,
            overlays: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    #[inline]
    pub fn planner(&self) -> &NavigationPlanner {
        &self.planner
    }

    #[inline]
    pub fn planner_mut(&mut self) -> &mut NavigationPlanner {
        &mut self.planner
    }

    #[inline]
    pub fn is_menu_open(&self) -> bool {
        self.menu_open
    }

    /// Open or close the menu. Returns whether it is open afterwards.
    ///
    /// Opening installs the navigation click handlers, closing restores the defaults.
    pub fn toggle_menu<S: MapSurface>(&mut self, map: &mut Worldmap2d<S>) -> bool {
        self.menu_open = !self.menu_open;
        if self.menu_open {
            map.activate_override_handlers(Box::new(NavigationClicks {
                picks: self.picks_tx.clone(),
            }));
        } else {
            map.restore_default_handlers();
            self.planner.set_active_input(None);
        }
        tracing::debug!("Navigation menu {}", if self.menu_open { "opened" } else { "closed" });
        self.menu_open
    }

    /// Apply clicks captured since the last call
    ///
    /// Returns the reverse geocoding lookups that would replace coordinate labels.
    pub fn process_clicks<S: MapSurface>(&mut self, map: &Worldmap2d<S>) -> Vec<LabelRequest> {
        let mut lookups = Vec::new();
        while let Ok(pick) = self.picks_rx.try_recv() {
            match pick {
                Pick::Map(position) => lookups.extend(self.planner.pick(position)),
                Pick::Marker(record) => match map.feature_builder().position(&record) {
                    Ok(position) => {
                        self.planner.fill_from_marker(record.text("name"), position);
                    }
                    Err(err) => tracing::warn!("Marker {} has no usable position: {}", record.key(), err),
                },
            }
        }
        lookups
    }

    /// Use the map's last known user position as start
    pub fn use_user_location<S: MapSurface>(&mut self, map: &Worldmap2d<S>) -> Result<()> {
        let position = map.user_position().map(|user| user.position);
        self.planner.use_user_location(position)
    }

    /// Validate the inputs and clear the previous route. Returns the waypoints to route through.
    pub fn begin_route<S: MapSurface>(&mut self, map: &mut Worldmap2d<S>) -> Result<Vec<Point<f64>>> {
        let waypoints = self.planner.routing_waypoints()?;
        self.clear_overlays(map);
        self.planner.set_plan(None);
        Ok(waypoints)
    }

    /// Draw a computed route with pulse markers on its waypoints and destination
    pub fn apply_route<S: MapSurface>(&mut self, map: &mut Worldmap2d<S>, plan: RoutePlan) {
        self.clear_overlays(map);

        let style = LineStyle {
            color: css_color(&self.config.route_color),
            ..LineStyle::default()
        };
        self.overlays.push(map.draw_polyline(&plan.path, &style));

        let pulse = IconSpec::pulse();
        let stops = self
            .planner
            .waypoints()
            .iter()
            .filter_map(|stop| stop.position)
            .chain(self.planner.destination().position)
            .collect::<Vec<_>>();
        for position in stops {
            self.overlays.push(map.place_overlay_marker(position, &pulse));
        }

        tracing::info!(
            "Route of {:.0} m with {} instruction(s)",
            plan.distance_m,
            plan.instructions.len()
        );
        self.planner.set_plan(Some(plan));
    }

    /// Remove the route and reset every input
    pub fn stop_navigation<S: MapSurface>(&mut self, map: &mut Worldmap2d<S>) {
        self.clear_overlays(map);
        self.planner.reset();
    }

    fn clear_overlays<S: MapSurface>(&mut self, map: &mut Worldmap2d<S>) {
        for entity in self.overlays.drain(..) {
            map.remove_overlay(entity);
        }
    }

    /// Route point records for the current inputs, along with the configured target
    pub fn prepare_save(&self, route_id: &str) -> Result<(String, Vec<RoutePointRecord>)> {
        if !self.config.enable_route_save {
            return Err(MapError::CapabilityUnavailable("route saving is disabled".into()));
        }
        let target = self
            .config
            .route_save_target
            .clone()
            .ok_or_else(|| MapError::Config("no route save target configured".into()))?;
        Ok((target, route_points_for_saving(&self.planner, route_id)?))
    }

    /// Connect a freshly added record to the previous one
    ///
    /// Straight lines are drawn right away and the view pans to the record. In routing
    /// mode the two positions to route between are returned.
    pub fn after_record_added<S: MapSurface>(
        &mut self,
        map: &mut Worldmap2d<S>,
        feature: &GeoFeature,
    ) -> Option<[Point<f64>; 2]> {
        if !self.config.create_route_from_data {
            return None;
        }
        match self.chain.next(feature, &self.config, map.icons()) {
            ChainStep::Started => None,
            ChainStep::TooShort { meters } => {
                tracing::trace!("Segment to {} is only {:.1} m, not drawn", feature.key(), meters);
                None
            }
            ChainStep::Line { from, to, style } => {
                map.draw_polyline(&[from, to], &style);
                map.surface_mut().pan_to(to);
                None
            }
            ChainStep::Route { from, to } => Some([from, to]),
        }
    }

    /// Draw the path of a data segment computed by the router
    pub fn apply_segment<S: MapSurface>(&mut self, map: &mut Worldmap2d<S>, plan: &RoutePlan) -> EntityHandle {
        let style = LineStyle {
            color: css_color(&self.config.route_color),
            ..LineStyle::default()
        };
        map.draw_polyline(&plan.path, &style)
    }
}

/// `3388FF` and `#3388FF` both become `#3388FF`; named colors pass through
fn css_color(raw: &str) -> String {
    if raw.len() == 6 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        format!("#{raw}")
    } else {
        raw.to_string()
    }
}
