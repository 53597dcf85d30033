//! Model file bookkeeping
//!
//! Model files are extra data drawn on top of the records. Files whose url contains
//! viewport placeholders (`{lon-left}`, `{lat-bottom}`, `{lon-right}`, `{lat-top}`,
//! `{zoom}`) are requested again after every viewport change; other files are requested
//! once. Loading is split in two: [`ModelTracker::requests`] says what to fetch, and the
//! component applies the fetched records when they arrive.

use crate::config::ModelFile;
use geo::Rect;
use std::collections::HashSet;

/// A model file to fetch, with placeholders already expanded
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub name: String,
    pub url: String,
    pub kind: Option<String>,
    pub viewport_based: bool,
}

/// Which model files exist and which have been loaded
#[derive(Debug, Clone, Default)]
pub struct ModelTracker {
    files: Vec<ModelFile>,
    requested: HashSet<String>,
    loaded: HashSet<String>,
}

impl ModelTracker {
    pub fn new(files: Vec<ModelFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn files(&self) -> &[ModelFile] {
        &self.files
    }

    /// Register another model file. A file with the same name is replaced.
    pub fn add(&mut self, file: ModelFile) {
        self.remove(&file.name);
        self.files.push(file);
    }

    /// Forget a model file. Returns whether it was known.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|file| file.name != name);
        self.requested.remove(name);
        self.loaded.remove(name);
        before != self.files.len()
    }

    #[inline]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    pub(crate) fn mark_loaded(&mut self, name: &str) -> bool {
        if self.files.iter().any(|file| file.name == name) {
            self.loaded.insert(name.to_string());
            true
        } else {
            false
        }
    }

    /// Files that should be fetched now
    ///
    /// Viewport-based files are only requested once a viewport is known. Files without
    /// placeholders are requested once until removed.
    pub fn requests(&mut self, viewport: Option<(Rect<f64>, f64)>) -> Vec<ModelRequest> {
        let mut requests = Vec::new();
        for file in &self.files {
            if file.is_viewport_based() {
                let Some((bounds, zoom)) = viewport else {
                    continue;
                };
                requests.push(ModelRequest {
                    name: file.name.clone(),
                    url: expand_viewport(&file.url, bounds, zoom),
                    kind: file.kind.clone(),
                    viewport_based: true,
                });
            } else if self.requested.insert(file.name.clone()) {
                requests.push(ModelRequest {
                    name: file.name.clone(),
                    url: file.url.clone(),
                    kind: file.kind.clone(),
                    viewport_based: false,
                });
            }
        }
        requests
    }
}

fn expand_viewport(url: &str, bounds: Rect<f64>, zoom: f64) -> String {
    url.replace("{lon-left}", &bounds.min().x.to_string())
        .replace("{lat-bottom}", &bounds.min().y.to_string())
        .replace("{lon-right}", &bounds.max().x.to_string())
        .replace("{lat-top}", &bounds.max().y.to_string())
        .replace("{zoom}", &zoom.round().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn files() -> Vec<ModelFile> {
        vec![
            ModelFile {
                url: "https://example.org/trees?bbox={lon-left},{lat-bottom},{lon-right},{lat-top}&z={zoom}".into(),
                name: "trees".into(),
                kind: Some("geojson".into()),
            },
            ModelFile {
                url: "https://example.org/city.geojson".into(),
                name: "city".into(),
                kind: None,
            },
        ]
    }

    #[test]
    fn test_viewport_requests_expand_placeholders() {
        let mut tracker = ModelTracker::new(files());
        let bounds = Rect::new(coord! { x: 8.5, y: 52.0 }, coord! { x: 9.0, y: 52.5 });
        let requests = tracker.requests(Some((bounds, 14.0)));
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].url,
            "https://example.org/trees?bbox=8.5,52,9,52.5&z=14"
        );
        assert!(requests[0].viewport_based);
    }

    #[test]
    fn test_static_files_requested_once() {
        let mut tracker = ModelTracker::new(files());
        assert_eq!(tracker.requests(None).len(), 1);
        assert!(tracker.requests(None).is_empty());

        let bounds = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let again = tracker.requests(Some((bounds, 10.0)));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].name, "trees");
    }

    #[test]
    fn test_remove_allows_reload() {
        let mut tracker = ModelTracker::new(files());
        tracker.requests(None);
        assert!(tracker.mark_loaded("city"));
        assert!(tracker.is_loaded("city"));
        assert!(tracker.remove("city"));
        assert!(!tracker.is_loaded("city"));
        assert!(!tracker.remove("city"));

        tracker.add(ModelFile {
            url: "https://example.org/city.geojson".into(),
            name: "city".into(),
            kind: None,
        });
        assert_eq!(tracker.requests(None).len(), 1);
    }
}
