//! Start, waypoint and destination state of the navigation form

use crate::capability::RoutePlan;
use crate::{MapError, Result};
use geo::Point;

/// Label given to the start when it is filled from the user's position
pub const USER_LOCATION_LABEL: &str = "My location";
/// Label for markers without a `name`
pub const MAP_PIN_LABEL: &str = "Map Pin";

/// Which input the next map click fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    Start,
    Waypoint(usize),
    Destination,
}

/// One input of the form: an optional position and the text shown for it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stop {
    pub position: Option<Point<f64>>,
    pub label: String,
}

impl Stop {
    fn set(&mut self, position: Point<f64>, label: String) {
        self.position = Some(position);
        self.label = label;
    }
}

/// Reverse geocoding wanted for a freshly picked position
///
/// The label is only replaced if the input still holds `position` when the answer arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRequest {
    pub target: PickTarget,
    pub position: Point<f64>,
}

/// Label shown while the reverse lookup is pending
pub fn coordinate_label(position: Point<f64>) -> String {
    format!("{}, {}", position.y(), position.x())
}

#[derive(Debug, Clone, Default)]
pub struct NavigationPlanner {
    start: Stop,
    destination: Stop,
    waypoints: Vec<Stop>,
    active: Option<PickTarget>,
    plan: Option<RoutePlan>,
}

impl NavigationPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn start(&self) -> &Stop {
        &self.start
    }

    #[inline]
    pub fn destination(&self) -> &Stop {
        &self.destination
    }

    #[inline]
    pub fn waypoints(&self) -> &[Stop] {
        &self.waypoints
    }

    #[inline]
    pub fn active_input(&self) -> Option<PickTarget> {
        self.active
    }

    /// Last applied route, if any
    #[inline]
    pub fn plan(&self) -> Option<&RoutePlan> {
        self.plan.as_ref()
    }

    pub(crate) fn set_plan(&mut self, plan: Option<RoutePlan>) {
        self.plan = plan;
    }

    /// Choose the input the next map click fills. Unknown waypoints are ignored.
    pub fn set_active_input(&mut self, target: Option<PickTarget>) {
        match target {
            Some(PickTarget::Waypoint(index)) if index >= self.waypoints.len() => {
                tracing::debug!("No waypoint {} to pick for", index);
            }
            _ => self.active = target,
        }
    }

    fn stop_mut(&mut self, target: PickTarget) -> Option<&mut Stop> {
        match target {
            PickTarget::Start => Some(&mut self.start),
            PickTarget::Destination => Some(&mut self.destination),
            PickTarget::Waypoint(index) => self.waypoints.get_mut(index),
        }
    }

    /// Fill an input directly. Returns false for unknown waypoints.
    pub fn set(&mut self, target: PickTarget, position: Point<f64>, label: impl Into<String>) -> bool {
        match self.stop_mut(target) {
            Some(stop) => {
                stop.set(position, label.into());
                true
            }
            None => false,
        }
    }

    /// Empty an input
    pub fn clear_input(&mut self, target: PickTarget) {
        if let Some(stop) = self.stop_mut(target) {
            *stop = Stop::default();
        }
    }

    /// Assign a clicked map position to the active input
    ///
    /// The input shows `"lat, lng"` until the returned lookup resolves. Without an active
    /// input the click is ignored.
    pub fn pick(&mut self, position: Point<f64>) -> Option<LabelRequest> {
        let target = self.active.take()?;
        if !self.set(target, position, coordinate_label(position)) {
            return None;
        }
        Some(LabelRequest { target, position })
    }

    /// Replace a coordinate label with a place name
    pub fn apply_label(&mut self, request: LabelRequest, label: String) -> bool {
        match self.stop_mut(request.target) {
            Some(stop) if stop.position == Some(request.position) => {
                stop.label = label;
                true
            }
            _ => false,
        }
    }

    /// Fill the start, then the destination, from a clicked marker
    pub fn fill_from_marker(&mut self, name: Option<String>, position: Point<f64>) -> Option<PickTarget> {
        let label = name.unwrap_or_else(|| MAP_PIN_LABEL.to_string());
        let target = if self.start.position.is_none() {
            PickTarget::Start
        } else if self.destination.position.is_none() {
            PickTarget::Destination
        } else {
            return None;
        };
        self.set(target, position, label);
        Some(target)
    }

    /// Append an empty waypoint input and make it the active one
    pub fn add_waypoint(&mut self) -> usize {
        self.waypoints.push(Stop::default());
        let index = self.waypoints.len() - 1;
        self.active = Some(PickTarget::Waypoint(index));
        index
    }

    pub fn remove_waypoint(&mut self, index: usize) -> bool {
        if index >= self.waypoints.len() {
            return false;
        }
        self.waypoints.remove(index);
        self.active = None;
        true
    }

    /// Exchange start and destination including their labels
    pub fn swap_start_destination(&mut self) {
        std::mem::swap(&mut self.start, &mut self.destination);
    }

    /// Use the last known user position as start
    pub fn use_user_location(&mut self, last_position: Option<Point<f64>>) -> Result<()> {
        let position = last_position
            .ok_or_else(|| MapError::NavigationIncomplete("no user position received yet".into()))?;
        self.start.set(position, USER_LOCATION_LABEL.to_string());
        Ok(())
    }

    /// Start, filled waypoints and destination, in that order
    pub fn routing_waypoints(&self) -> Result<Vec<Point<f64>>> {
        let (Some(start), Some(destination)) = (self.start.position, self.destination.position) else {
            return Err(MapError::NavigationIncomplete(
                "start and destination are required".into(),
            ));
        };
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(start);
        points.extend(self.waypoints.iter().filter_map(|stop| stop.position));
        points.push(destination);
        Ok(points)
    }

    /// Forget every input, label and route
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::lat_lon;

    #[test]
    fn test_pick_fills_active_input_once() {
        let mut planner = NavigationPlanner::new();
        assert!(planner.pick(lat_lon(52.0, 8.0)).is_none());

        planner.set_active_input(Some(PickTarget::Start));
        let request = planner.pick(lat_lon(52.5, 8.25)).unwrap();
        assert_eq!(request.target, PickTarget::Start);
        assert_eq!(planner.start().label, "52.5, 8.25");
        assert!(planner.active_input().is_none());

        assert!(planner.apply_label(request, "Bielefeld".into()));
        assert_eq!(planner.start().label, "Bielefeld");
    }

    #[test]
    fn test_stale_label_is_dropped() {
        let mut planner = NavigationPlanner::new();
        planner.set_active_input(Some(PickTarget::Destination));
        let first = planner.pick(lat_lon(1.0, 1.0)).unwrap();
        planner.set_active_input(Some(PickTarget::Destination));
        planner.pick(lat_lon(2.0, 2.0)).unwrap();
        assert!(!planner.apply_label(first, "Old".into()));
        assert_eq!(planner.destination().label, "2, 2");
    }

    #[test]
    fn test_marker_fills_start_then_destination() {
        let mut planner = NavigationPlanner::new();
        assert_eq!(
            planner.fill_from_marker(Some("Hall".into()), lat_lon(1.0, 1.0)),
            Some(PickTarget::Start)
        );
        assert_eq!(planner.fill_from_marker(None, lat_lon(2.0, 2.0)), Some(PickTarget::Destination));
        assert_eq!(planner.destination().label, MAP_PIN_LABEL);
        assert_eq!(planner.fill_from_marker(None, lat_lon(3.0, 3.0)), None);
    }

    #[test]
    fn test_routing_waypoints_order() {
        let mut planner = NavigationPlanner::new();
        assert!(matches!(planner.routing_waypoints(), Err(MapError::NavigationIncomplete(_))));

        planner.set(PickTarget::Start, lat_lon(1.0, 1.0), "a");
        planner.set(PickTarget::Destination, lat_lon(4.0, 4.0), "d");
        let first = planner.add_waypoint();
        planner.add_waypoint();
        let third = planner.add_waypoint();
        assert!(planner.set(PickTarget::Waypoint(first), lat_lon(2.0, 2.0), "b"));
        assert!(planner.set(PickTarget::Waypoint(third), lat_lon(3.0, 3.0), "c"));
        assert!(!planner.set(PickTarget::Waypoint(9), lat_lon(0.0, 0.0), "x"));

        let points = planner.routing_waypoints().unwrap();
        assert_eq!(
            points,
            vec![lat_lon(1.0, 1.0), lat_lon(2.0, 2.0), lat_lon(3.0, 3.0), lat_lon(4.0, 4.0)]
        );
    }

    #[test]
    fn test_swap_and_user_location() {
        let mut planner = NavigationPlanner::new();
        assert!(planner.use_user_location(None).is_err());
        planner.use_user_location(Some(lat_lon(1.0, 2.0))).unwrap();
        assert_eq!(planner.start().label, USER_LOCATION_LABEL);

        planner.swap_start_destination();
        assert!(planner.start().position.is_none());
        assert_eq!(planner.destination().position, Some(lat_lon(1.0, 2.0)));

        planner.reset();
        assert_eq!(planner.destination(), &Stop::default());
    }
}
