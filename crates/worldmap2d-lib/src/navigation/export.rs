//! Saving planned routes as route point records and GPX

use super::planner::NavigationPlanner;
use crate::capability::{RoutePointRecord, RouteStore};
use crate::{MapError, Result};
use gpx::{Gpx, GpxVersion, Route, Waypoint};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// `route_<milliseconds since epoch>`
pub fn route_id_now() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("route_{millis}")
}

fn step_description(step: usize, count: usize) -> String {
    if step == 0 {
        "Start".to_string()
    } else if step + 1 == count {
        "Destination".to_string()
    } else {
        format!("Stop {step}")
    }
}

/// One record per routing waypoint, positions as `POINT(lng lat)`
pub fn route_points_for_saving(planner: &NavigationPlanner, route_id: &str) -> Result<Vec<RoutePointRecord>> {
    let points = planner.routing_waypoints()?;
    let count = points.len();
    Ok(points
        .into_iter()
        .enumerate()
        .map(|(step, point)| RoutePointRecord {
            route_id: route_id.to_string(),
            step,
            pos: format!("POINT({} {})", point.x(), point.y()),
            description: step_description(step, count),
        })
        .collect())
}

/// Hand the route points to `store`
pub async fn save_route(store: &dyn RouteStore, target: &str, points: &[RoutePointRecord]) -> Result<()> {
    store.save(target, points).await.inspect_err(|err| {
        tracing::error!("Saving route to '{}' failed: {}", target, err);
    })?;
    tracing::info!("Saved {} route point(s) to '{}'", points.len(), target);
    Ok(())
}

/// GPX document with the waypoints as a route and, if computed, the path as a track
pub fn route_to_gpx(planner: &NavigationPlanner) -> Result<Gpx> {
    let points = planner.routing_waypoints()?;
    let count = points.len();

    let mut route = Route::default();
    route.name = Some("Planned route".to_string());
    route.points = points
        .into_iter()
        .enumerate()
        .map(|(step, point)| {
            let mut waypoint = Waypoint::new(point);
            waypoint.name = Some(step_description(step, count));
            waypoint
        })
        .collect();

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(concat!("worldmap2d ", env!("CARGO_PKG_VERSION")).to_string()),
        ..Gpx::default()
    };
    gpx.routes.push(route);

    if let Some(plan) = planner.plan().filter(|plan| !plan.path.is_empty()) {
        let mut segment = gpx::TrackSegment::default();
        segment.points = plan.path.iter().copied().map(Waypoint::new).collect();
        let mut track = gpx::Track::default();
        track.name = Some("Computed path".to_string());
        track.segments.push(segment);
        gpx.tracks.push(track);
    }
    Ok(gpx)
}

/// Write the planned route as GPX 1.1
pub fn export_gpx<W: Write>(planner: &NavigationPlanner, writer: W) -> Result<()> {
    let gpx = route_to_gpx(planner)?;
    gpx::write(&gpx, writer).map_err(|err| MapError::Export(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RoutePlan;
    use crate::geodesy::lat_lon;
    use crate::navigation::PickTarget;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn planner() -> NavigationPlanner {
        let mut planner = NavigationPlanner::new();
        planner.set(PickTarget::Start, lat_lon(52.0, 8.0), "a");
        let index = planner.add_waypoint();
        planner.set(PickTarget::Waypoint(index), lat_lon(52.1, 8.1), "b");
        planner.set(PickTarget::Destination, lat_lon(52.2, 8.2), "c");
        planner
    }

    #[test]
    fn test_route_points() {
        let points = route_points_for_saving(&planner(), "route_1").unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].pos, "POINT(8 52)");
        assert_eq!(points[0].description, "Start");
        assert_eq!(points[1].description, "Stop 1");
        assert_eq!(points[2].description, "Destination");
        assert!(points.iter().all(|p| p.route_id == "route_1"));
    }

    #[test]
    fn test_incomplete_route_is_rejected() {
        let planner = NavigationPlanner::new();
        assert!(matches!(
            route_points_for_saving(&planner, "x"),
            Err(MapError::NavigationIncomplete(_))
        ));
    }

    #[test]
    fn test_gpx_contains_route_and_path() {
        let mut planner = planner();
        planner.set_plan(Some(RoutePlan {
            path: vec![lat_lon(52.0, 8.0), lat_lon(52.2, 8.2)],
            ..RoutePlan::default()
        }));

        let mut buffer = Vec::new();
        export_gpx(&planner, &mut buffer).unwrap();
        let parsed = gpx::read(buffer.as_slice()).unwrap();
        assert_eq!(parsed.routes[0].points.len(), 3);
        assert_eq!(parsed.routes[0].points[2].name.as_deref(), Some("Destination"));
        assert_eq!(parsed.tracks[0].segments[0].points.len(), 2);
    }

    #[test]
    fn test_route_id_format() {
        let id = route_id_now();
        assert!(id.starts_with("route_"));
        assert!(id["route_".len()..].parse::<u128>().is_ok());
    }

    struct MemoryStore(Mutex<Vec<(String, usize)>>);

    #[async_trait]
    impl RouteStore for MemoryStore {
        async fn save(&self, target: &str, points: &[RoutePointRecord]) -> Result<()> {
            self.0.lock().unwrap().push((target.to_string(), points.len()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_save_route() {
        let store = MemoryStore(Mutex::new(Vec::new()));
        let points = route_points_for_saving(&planner(), "route_2").unwrap();
        save_route(&store, "routes", &points).await.unwrap();
        assert_eq!(store.0.lock().unwrap().as_slice(), &[("routes".to_string(), 3)]);
    }
}
