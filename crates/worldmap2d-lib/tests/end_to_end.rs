//! End-to-end tests driving the map component through the headless surface

use geo::{Point, Rect, coord};
use serde_json::json;
use std::sync::{Arc, Mutex};
use worldmap2d_lib::config::ModelFile;
use worldmap2d_lib::surface::RecordedEntity;
use worldmap2d_lib::{
    DatasetEvent, InputEvent, Interaction, MapConfig, MapEvent, Record, RecordKey, RecordingSurface,
    Worldmap2d,
};

fn map_with(config: MapConfig) -> Worldmap2d<RecordingSurface> {
    Worldmap2d::new(config, RecordingSurface::new(), None).unwrap()
}

fn sensor() -> Record {
    Record::from_json(
        "sensors",
        json!({"id": 1, "longitude": 8.9, "latitude": 52.3}),
    )
    .unwrap()
}

#[test]
fn test_insert_shows_marker_in_source_layer() {
    let mut map = map_with(MapConfig::default());
    map.handle_dataset(DatasetEvent::RecordAdded(sensor())).unwrap();

    let key = RecordKey::new("sensors", 1);
    assert_eq!(map.registry().len(), 1);
    let entity = map.registry().get(&key).unwrap();

    let layer = map.surface().layer_named("sensors").unwrap();
    assert_eq!(layer.members, vec![entity.handle]);
    assert!(layer.attached);
    assert_eq!(layer.overlay.as_deref(), Some("sensors"));

    match map.surface().entity(entity.handle) {
        Some(RecordedEntity::Marker { position, .. }) => assert_eq!(*position, Point::new(8.9, 52.3)),
        other => panic!("expected a marker, got {other:?}"),
    }
}

#[test]
fn test_insert_then_remove_keeps_empty_layer() {
    let mut map = map_with(MapConfig::default());
    map.handle_dataset(DatasetEvent::RecordAdded(sensor())).unwrap();
    map.handle_dataset(DatasetEvent::RecordRemoved(RecordKey::new("sensors", 1)))
        .unwrap();
    // Removing twice is a no-op
    map.handle_dataset(DatasetEvent::RecordRemoved(RecordKey::new("sensors", 1)))
        .unwrap();

    assert!(map.registry().get(&RecordKey::new("sensors", 1)).is_none());
    assert!(map.registry().layer("sensors").is_some());
    assert!(map.surface().layer_named("sensors").unwrap().members.is_empty());
    assert!(map.registry().is_consistent());
}

#[test]
fn test_interaction_round_trip() {
    let mut map = map_with(MapConfig::default());
    let initial = map.interaction_state();

    map.disable_all_interactions();
    assert!(!map.handle_input(InputEvent::MapClick {
        position: Point::new(8.0, 52.0)
    }));
    assert!(!map.surface().interaction_enabled(Interaction::Dragging));

    map.enable_all_interactions();
    assert_eq!(map.interaction_state(), initial);
    assert!(map.handle_input(InputEvent::MapClick {
        position: Point::new(8.0, 52.0)
    }));
    assert!(
        map.events()
            .events()
            .contains(&MapEvent::MapClicked { position: Point::new(8.0, 52.0) })
    );
}

#[test]
fn test_subscribers_see_marker_clicks() {
    let mut map = map_with(MapConfig::default());
    let clicked = Arc::new(Mutex::new(Vec::new()));
    let sink = clicked.clone();
    map.events_mut().subscribe(move |event| {
        if let MapEvent::MarkerClicked { key } = event {
            sink.lock().unwrap().push(key.clone());
        }
    });

    map.add_record(&sensor()).unwrap();
    let handle = map.registry().get(&RecordKey::new("sensors", 1)).unwrap().handle;
    assert!(map.handle_input(InputEvent::MarkerClick { entity: handle }));
    assert_eq!(clicked.lock().unwrap().as_slice(), &[RecordKey::new("sensors", 1)]);
}

#[test]
fn test_config_from_json_drives_mapping_and_visibility() {
    let config = MapConfig::from_json_str(
        r#"{
            "zoom": 12,
            "datasources": {
                "stations": {"latitude_attr": "pos.lat", "longitude_attr": "pos.lon"},
                "hidden": {"displayed": false}
            }
        }"#,
    )
    .unwrap();
    let mut map = map_with(config);

    let station = Record::new("stations", 5, json!({"pos": {"lat": 51.0, "lon": 7.0}, "type_id": 2}));
    let hidden = Record::new("hidden", 6, json!({"latitude": 51.1, "longitude": 7.1, "type_id": 3}));
    map.add_record(&station).unwrap();
    map.add_record(&hidden).unwrap();

    assert!(!map.surface().layer_named("hidden").unwrap().attached);
    assert!(map.set_layer_displayed("hidden", true));
    assert!(map.surface().layer_named("hidden").unwrap().attached);

    assert_eq!(map.filter_markers(Some(&json!("2"))), 1);
    assert!(map.surface().layer_named("hidden").unwrap().members.is_empty());
    assert_eq!(map.filter_markers(None), 2);
    assert_eq!(map.surface().layer_named("stations").unwrap().members.len(), 1);
    assert_eq!(map.surface().layer_named("hidden").unwrap().members.len(), 1);
}

#[test]
fn test_viewport_model_files_reload_and_replace() {
    let config = MapConfig {
        model_files: vec![ModelFile {
            url: "https://models.example/trees?bbox={lon-left},{lat-bottom},{lon-right},{lat-top}".into(),
            name: "trees".into(),
            kind: None,
        }],
        ..MapConfig::default()
    };
    let mut map = map_with(config);
    assert!(map.model_requests().is_empty());

    let bounds = Rect::new(coord! { x: 8.0, y: 52.0 }, coord! { x: 9.0, y: 53.0 });
    assert!(map.handle_input(InputEvent::MoveEnd { bounds, zoom: 13.0 }));
    let requests = map.model_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://models.example/trees?bbox=8,52,9,53");

    let tree = |id, lon: f64| {
        Record::new(
            "trees",
            id,
            json!({"geometry": {"type": "Point", "coordinates": [lon, 52.5]}, "name": "Oak"}),
        )
    };
    assert_eq!(map.apply_model("trees", &[tree(1, 8.1), tree(2, 8.2)]), 2);
    assert_eq!(map.apply_model("trees", &[tree(3, 8.3)]), 1);
    assert_eq!(map.surface().layer_named("trees").unwrap().members.len(), 1);

    assert!(map.remove_model_file("trees"));
    assert!(map.registry().layer("trees").is_none());
    assert!(map.surface().layer_named("trees").is_none());
    assert_eq!(map.apply_model("trees", &[tree(4, 8.4)]), 0);
}
