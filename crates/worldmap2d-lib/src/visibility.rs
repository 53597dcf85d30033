//! Layer visibility controller
//!
//! Filtering only changes which entities are in their layer's display list. The registry
//! index is never touched, so filtering with no predicate restores every entity exactly once.

use crate::record::value_as_f64;
use crate::{FieldPath, MapSurface, MarkerRegistry, Record};
use serde_json::Value;

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MarkerRegistry {
    /// Rebuild every layer's display list from the entities matching `predicate`
    ///
    /// `None` shows all entities. Returns the number of entities shown.
    pub fn filter_by(
        &mut self,
        surface: &mut dyn MapSurface,
        predicate: Option<&dyn Fn(&Record) -> bool>,
    ) -> usize {
        #[cfg(feature = "profiling")]
        profiling::scope!("visibility::filter_by");

        let sources: Vec<String> = self.layers().iter().map(|l| l.name.clone()).collect();
        for source in &sources {
            if let Some(layer) = self.layer_mut(source) {
                let handle = layer.handle;
                layer.shown.clear();
                surface.clear_layer(handle);
            }
        }

        let mut visible = Vec::new();
        for entity in self.iter() {
            if predicate.is_none_or(|keep| keep(&entity.record)) {
                visible.push((entity.key().clone(), entity.handle));
            }
        }

        let shown = visible.len();
        for (key, handle) in visible {
            if let Some(layer) = self.layer_mut(&key.source) {
                surface.add_to_layer(layer.handle, handle);
                layer.shown.insert(key);
            }
        }

        tracing::debug!("Filter shows {} of {} entities", shown, self.len());
        shown
    }

    /// Show only entities whose `attribute` loosely equals `value`; `None` shows all
    pub fn filter_by_attribute(
        &mut self,
        surface: &mut dyn MapSurface,
        attribute: &FieldPath,
        value: Option<&Value>,
    ) -> usize {
        match value {
            None => self.filter_by(surface, None),
            Some(expected) => {
                let predicate = |record: &Record| {
                    record
                        .resolve(attribute)
                        .is_some_and(|actual| loose_eq(actual, expected))
                };
                self.filter_by(surface, Some(&predicate))
            }
        }
    }

    /// Attach or detach the layer of `source`. Returns whether the layer exists.
    pub fn set_layer_displayed(&mut self, surface: &mut dyn MapSurface, source: &str, displayed: bool) -> bool {
        let Some(layer) = self.layer_mut(source) else {
            return false;
        };
        if layer.displayed != displayed {
            if displayed {
                surface.attach_layer(layer.handle);
            } else {
                surface.detach_layer(layer.handle);
            }
            layer.displayed = displayed;
        }
        true
    }
}

/// Equality that treats `3`, `3.0` and `"3"` alike
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (value_as_f64(a), value_as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (Value::String(x), other) | (other, Value::String(x)) => {
                !other.is_string() && !other.is_null() && *x == other.to_string()
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{IconSpec, RecordingSurface};
    use crate::{GeoFeature, Geometry, HandlerSetId, RecordKey};
    use geo::Point;
    use serde_json::json;

    fn populated() -> (MarkerRegistry, RecordingSurface) {
        let mut registry = MarkerRegistry::new();
        let mut surface = RecordingSurface::new();
        for (source, id, type_id) in [("a", 1, json!(1)), ("a", 2, json!("2")), ("b", 3, json!(2))] {
            let feature = GeoFeature {
                geometry: Geometry::Point(Point::new(8.0, 52.0)),
                record: Record::new(source, id, json!({ "type_id": type_id })),
            };
            registry
                .upsert_marker(&mut surface, &feature, IconSpec::pin("m.png"), false, None, HandlerSetId::DEFAULT)
                .unwrap();
        }
        (registry, surface)
    }

    fn members(surface: &RecordingSurface, source: &str) -> usize {
        surface.layer_named(source).map_or(0, |l| l.members.len())
    }

    #[test]
    fn test_filter_and_restore() {
        let (mut registry, mut surface) = populated();
        let type_id = FieldPath::parse("type_id").unwrap();

        assert_eq!(registry.filter_by_attribute(&mut surface, &type_id, Some(&json!(2))), 2);
        assert_eq!(members(&surface, "a"), 1);
        assert_eq!(members(&surface, "b"), 1);
        assert!(!registry.layer("a").unwrap().is_shown(&RecordKey::new("a", 1)));
        assert_eq!(registry.len(), 3);

        assert_eq!(registry.filter_by(&mut surface, None), 3);
        assert_eq!(members(&surface, "a"), 2);
        assert_eq!(members(&surface, "b"), 1);
    }

    #[test]
    fn test_filter_none_is_idempotent() {
        let (mut registry, mut surface) = populated();
        registry.filter_by(&mut surface, None);
        registry.filter_by(&mut surface, None);
        assert_eq!(members(&surface, "a"), 2);
        assert_eq!(members(&surface, "b"), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_custom_predicate() {
        let (mut registry, mut surface) = populated();
        let only_b = |record: &Record| record.source() == "b";
        assert_eq!(registry.filter_by(&mut surface, Some(&only_b)), 1);
        assert_eq!(members(&surface, "a"), 0);
    }

    #[test]
    fn test_set_layer_displayed() {
        let (mut registry, mut surface) = populated();
        assert!(registry.set_layer_displayed(&mut surface, "a", false));
        assert!(!surface.layer_named("a").unwrap().attached);
        assert!(registry.set_layer_displayed(&mut surface, "a", true));
        assert!(surface.layer_named("a").unwrap().attached);
        assert!(!registry.set_layer_displayed(&mut surface, "missing", true));
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!(3), &json!("3")));
        assert!(loose_eq(&json!(3.0), &json!(3)));
        assert!(loose_eq(&json!(true), &json!("true")));
        assert!(!loose_eq(&json!("x"), &json!(null)));
        assert!(!loose_eq(&json!(1), &json!(2)));
    }
}
