//! Connects consecutive records into a track as they arrive

use crate::config::NavigationConfig;
use crate::geodesy::distance_km;
use crate::surface::LineStyle;
use crate::{GeoFeature, IconResolver, Record};
use geo::Point;

const PROCESS_ATTR: &str = "measurement_process";

/// What to do with the segment ending at the newest record
#[derive(Debug, Clone, PartialEq)]
pub enum ChainStep {
    /// First record, or a record of another measurement process: nothing to connect
    Started,
    /// Segment shorter than the configured minimum
    TooShort { meters: f64 },
    /// Draw a straight line, then pan to the newest record
    Line { from: Point<f64>, to: Point<f64>, style: LineStyle },
    /// Ask the router for the path between both records
    Route { from: Point<f64>, to: Point<f64> },
}

/// Remembers the previously added record
#[derive(Debug, Clone, Default)]
pub struct RouteChain {
    last: Option<(Record, Point<f64>)>,
}

impl RouteChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Decide how `feature` connects to the record before it
    pub fn next(&mut self, feature: &GeoFeature, config: &NavigationConfig, icons: &IconResolver) -> ChainStep {
        let Some(to) = feature.geometry.anchor() else {
            return ChainStep::Started;
        };
        let current = feature.record.clone();
        let Some((previous, from)) = self.last.replace((current, to)) else {
            return ChainStep::Started;
        };

        if !config.connect_with_line {
            return ChainStep::Route { from, to };
        }

        if previous.get(PROCESS_ATTR) != feature.record.get(PROCESS_ATTR) {
            tracing::debug!("{} starts a new measurement process", feature.key());
            return ChainStep::Started;
        }

        let meters = distance_km(from, to) * 1000.0;
        if meters < config.min_distance_m {
            return ChainStep::TooShort { meters };
        }

        let color = icons
            .resolve_color(&feature.record)
            .map(|color| format!("#{color}"))
            .unwrap_or_else(|| config.line_color.clone());
        ChainStep::Line {
            from,
            to,
            style: LineStyle {
                color,
                weight: 4.0,
                opacity: 0.9,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeatureBuilder, MapConfig};
    use serde_json::json;

    fn feature(id: i64, lat: f64, lon: f64, process: i64) -> GeoFeature {
        let record = Record::new(
            "track",
            id,
            json!({"latitude": lat, "longitude": lon, "measurement_process": process}),
        );
        FeatureBuilder::new(&MapConfig::default()).build(&record).unwrap()
    }

    fn line_config() -> NavigationConfig {
        NavigationConfig {
            create_route_from_data: true,
            connect_with_line: true,
            ..NavigationConfig::default()
        }
    }

    #[test]
    fn test_line_between_records() {
        let icons = IconResolver::new(&MapConfig::default(), None);
        let config = line_config();
        let mut chain = RouteChain::new();
        assert_eq!(chain.next(&feature(1, 52.0, 8.0, 1), &config, &icons), ChainStep::Started);
        match chain.next(&feature(2, 52.01, 8.0, 1), &config, &icons) {
            ChainStep::Line { style, .. } => {
                assert_eq!(style.color, "sienna");
                assert_eq!(style.weight, 4.0);
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn test_short_and_foreign_segments() {
        let icons = IconResolver::new(&MapConfig::default(), None);
        let config = line_config();
        let mut chain = RouteChain::new();
        chain.next(&feature(1, 52.0, 8.0, 1), &config, &icons);
        assert!(matches!(
            chain.next(&feature(2, 52.0001, 8.0, 1), &config, &icons),
            ChainStep::TooShort { meters } if meters < 50.0
        ));
        assert_eq!(chain.next(&feature(3, 53.0, 8.0, 2), &config, &icons), ChainStep::Started);
    }

    #[test]
    fn test_routing_mode() {
        let icons = IconResolver::new(&MapConfig::default(), None);
        let config = NavigationConfig {
            create_route_from_data: true,
            ..NavigationConfig::default()
        };
        let mut chain = RouteChain::new();
        chain.next(&feature(1, 52.0, 8.0, 1), &config, &icons);
        assert!(matches!(
            chain.next(&feature(2, 52.0, 8.0, 7), &config, &icons),
            ChainStep::Route { .. }
        ));
    }
}
