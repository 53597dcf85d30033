//! Background calls to the remote capabilities
//!
//! Every request runs on the tokio runtime the app was started in. Results come back over
//! a channel and are applied on the UI thread, in arrival order, by [`Tasks::drain`].

use async_trait::async_trait;
use geo::Point;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use worldmap2d_lib::navigation::{LabelRequest, PickTarget, save_route};
use worldmap2d_lib::{
    Geocoder, MapError, ModelRequest, ModelSource, Record, Result, RoutePlan, RoutePointRecord, RouteStore,
    Router,
};

/// Outcome of a background call
#[derive(Debug)]
pub enum TaskResult {
    /// Reverse geocoding of a picked position
    Label { request: LabelRequest, label: Result<String> },
    /// Route through the navigation inputs
    Route(Result<RoutePlan>),
    /// Routed segment between two consecutive records
    Segment(Result<RoutePlan>),
    Model { name: String, records: Result<Vec<Record>> },
    /// Forward geocoding typed into a navigation input
    Geocoded { target: PickTarget, query: String, position: Result<Point<f64>> },
    Saved { target: String, result: Result<usize> },
}

/// Remote capabilities available to the app
#[derive(Clone)]
pub struct Capabilities {
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub router: Option<Arc<dyn Router>>,
    pub models: Option<Arc<dyn ModelSource>>,
    pub store: Arc<dyn RouteStore>,
}

pub struct Tasks {
    runtime: Option<Handle>,
    capabilities: Capabilities,
    tx: UnboundedSender<TaskResult>,
    rx: UnboundedReceiver<TaskResult>,
    ctx: egui::Context,
    in_flight: usize,
}

impl Tasks {
    pub fn new(ctx: egui::Context, capabilities: Capabilities) -> Self {
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            tracing::warn!("No async runtime available, remote capabilities are disabled");
        }
        let (tx, rx) = unbounded_channel();
        Self {
            runtime,
            capabilities,
            tx,
            rx,
            ctx,
            in_flight: 0,
        }
    }

    /// Number of calls still running
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn spawn<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            return false;
        };
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        runtime.spawn(async move {
            // The receiver only goes away with the app
            let _ = tx.send(task.await);
            ctx.request_repaint();
        });
        self.in_flight += 1;
        true
    }

    /// Results that arrived since the last call
    pub fn drain(&mut self) -> Vec<TaskResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        self.in_flight = self.in_flight.saturating_sub(results.len());
        results
    }

    pub fn reverse_geocode(&mut self, request: LabelRequest) -> bool {
        let Some(geocoder) = self.capabilities.geocoder.clone() else {
            return false;
        };
        self.spawn(async move {
            TaskResult::Label {
                request,
                label: geocoder.reverse(request.position).await,
            }
        })
    }

    pub fn geocode(&mut self, target: PickTarget, query: String) -> Result<()> {
        let geocoder = self
            .capabilities
            .geocoder
            .clone()
            .ok_or_else(|| MapError::CapabilityUnavailable("geocoder".into()))?;
        runtime_required(self.spawn(async move {
            let position = geocoder.forward(&query).await;
            TaskResult::Geocoded { target, query, position }
        }))
    }

    pub fn route(&mut self, waypoints: Vec<Point<f64>>) -> Result<()> {
        let router = self.router()?;
        runtime_required(self.spawn(async move { TaskResult::Route(router.route(&waypoints).await) }))
    }

    pub fn route_segment(&mut self, from: Point<f64>, to: Point<f64>) -> Result<()> {
        let router = self.router()?;
        runtime_required(self.spawn(async move { TaskResult::Segment(router.route(&[from, to]).await) }))
    }

    pub fn load_model(&mut self, request: ModelRequest) -> Result<()> {
        let models = self
            .capabilities
            .models
            .clone()
            .ok_or_else(|| MapError::CapabilityUnavailable("model loading".into()))?;
        runtime_required(self.spawn(async move {
            let records = models.load(&request.url, &request.name).await;
            TaskResult::Model {
                name: request.name,
                records,
            }
        }))
    }

    pub fn save(&mut self, target: String, points: Vec<RoutePointRecord>) -> Result<()> {
        let store = self.capabilities.store.clone();
        runtime_required(self.spawn(async move {
            let result = save_route(store.as_ref(), &target, &points).await.map(|()| points.len());
            TaskResult::Saved { target, result }
        }))
    }

    fn router(&self) -> Result<Arc<dyn Router>> {
        self.capabilities
            .router
            .clone()
            .ok_or_else(|| MapError::CapabilityUnavailable("router".into()))
    }
}

fn runtime_required(spawned: bool) -> Result<()> {
    if spawned {
        Ok(())
    } else {
        Err(MapError::CapabilityUnavailable("async runtime".into()))
    }
}

/// Saves routes as JSON files, one per route: `{dir}/{target}-{route_id}.json`
pub struct FileRouteStore {
    dir: PathBuf,
}

impl FileRouteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, target: &str, points: &[RoutePointRecord]) -> PathBuf {
        let route_id = points.first().map(|point| point.route_id.as_str()).unwrap_or("route");
        let file_name: String = format!("{target}-{route_id}.json")
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.dir.join(file_name)
    }
}

#[async_trait]
impl RouteStore for FileRouteStore {
    async fn save(&self, target: &str, points: &[RoutePointRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(points)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(target, points);
        tokio::fs::write(&path, json).await?;
        tracing::debug!("Route written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(route_id: &str, step: usize) -> RoutePointRecord {
        RoutePointRecord {
            route_id: route_id.to_string(),
            step,
            pos: "POINT(8.9 52.3)".to_string(),
            description: "Start".to_string(),
        }
    }

    #[test]
    fn test_route_file_name() {
        let store = FileRouteStore::new("routes");
        let path = store.path_for("my routes", &[point("route_17", 0)]);
        assert_eq!(path, PathBuf::from("routes").join("my_routes-route_17.json"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_file_store_writes_points() {
        let dir = std::env::temp_dir().join(format!("worldmap2d-routes-{}", std::process::id()));
        let store = FileRouteStore::new(&dir);
        store.save("routes", &[point("route_1", 0), point("route_1", 1)]).await.unwrap();

        let written = std::fs::read_to_string(dir.join("routes-route_1.json")).unwrap();
        let points: Vec<RoutePointRecord> = serde_json::from_str(&written).unwrap();
        assert_eq!(points.len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_capabilities_are_reported() {
        let mut tasks = Tasks::new(
            egui::Context::default(),
            Capabilities {
                geocoder: None,
                router: None,
                models: None,
                store: Arc::new(FileRouteStore::new("unused")),
            },
        );
        assert!(matches!(tasks.route(Vec::new()), Err(MapError::CapabilityUnavailable(_))));
        assert!(!tasks.reverse_geocode(LabelRequest {
            target: PickTarget::Start,
            position: Point::new(8.0, 52.0),
        }));
        assert_eq!(tasks.in_flight(), 0);
    }
}
