//! Marker icon selection
//!
//! Icons come from, in priority order: an explicit override, the visited/unvisited state of
//! the record, a color from the linked data description, and the configured default.
//! Colors are compared in normalized form so that equivalent spellings never cause a
//! re-render.

use crate::config::{IconConfig, MapConfig};
use crate::{DataDescription, IconSpec, MapSurface, MarkerRegistry, Record};
use std::fmt;
use std::sync::Arc;

/// Canonical grey; every spelling of grey maps to it
const GREY: &str = "7B7B7B";

/// Normalized marker color: no `#`, upper case, one spelling of grey
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorToken(String);

impl ColorToken {
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().trim_start_matches('#').to_ascii_uppercase();
        match upper.as_str() {
            "808080" | "GREY" | "GRAY" => Self(GREY.to_string()),
            _ => Self(upper),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn icon_from_config(config: &IconConfig) -> IconSpec {
    IconSpec {
        color: config.color.as_deref().map(ColorToken::normalize),
        ..IconSpec::pin(config.url.clone())
    }
}

/// Chooses marker icons and re-applies them when colors change
pub struct IconResolver {
    base_url: String,
    default_icon: IconSpec,
    custom: Option<IconSpec>,
    visited: Option<IconSpec>,
    unvisited: Option<IconSpec>,
    description: Option<Arc<dyn DataDescription>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl IconResolver {
    pub fn new(config: &MapConfig, description: Option<Arc<dyn DataDescription>>) -> Self {
        Self {
            base_url: config.icon_base_url.clone(),
            default_icon: icon_from_config(&config.default_icon),
            custom: config.custom_icon.as_ref().map(icon_from_config),
            visited: config.visited_icon.as_ref().map(icon_from_config),
            unvisited: config.unvisited_icon.as_ref().map(icon_from_config),
            description,
        }
    }

    /// Replace the linked data description
    pub fn set_description(&mut self, description: Option<Arc<dyn DataDescription>>) {
        self.description = description;
    }

    #[inline]
    pub fn has_description(&self) -> bool {
        self.description.is_some()
    }

    /// Color the data description assigns to `record`, normalized
    pub fn resolve_color(&self, record: &Record) -> Option<ColorToken> {
        let description = self.description.as_ref()?;
        description
            .value_color(record)
            .map(|raw| ColorToken::normalize(&raw))
    }

    /// Icon for `record`. A configured custom icon counts as an explicit override.
    pub fn select_icon(&self, record: &Record, explicit: Option<&IconSpec>) -> IconSpec {
        if let Some(icon) = explicit.or(self.custom.as_ref()) {
            return icon.clone();
        }

        let completed = matches!(record.get("completed"), Some(serde_json::Value::Bool(true)));
        if completed && let Some(visited) = &self.visited {
            return visited.clone();
        }
        if !completed
            && !record.fields().is_empty()
            && let Some(unvisited) = &self.unvisited
        {
            return unvisited.clone();
        }

        match self.resolve_color(record) {
            Some(color) => IconSpec::colored(&self.base_url, color, record.text("name")),
            None => self.default_icon.clone(),
        }
    }

    /// Re-resolve every live marker and re-apply icons whose color changed
    ///
    /// Markers created with an explicit override keep it. Returns the number of markers
    /// whose icon was re-applied.
    pub fn refresh_all(&self, registry: &mut MarkerRegistry, surface: &mut dyn MapSurface) -> usize {
        #[cfg(feature = "profiling")]
        profiling::scope!("icons::refresh_all");

        let mut reapplied = 0;
        for key in registry.keys().to_vec() {
            let Some(entity) = registry.entity_mut(&key) else {
                continue;
            };
            if !entity.is_marker() || entity.has_explicit_icon() {
                continue;
            }
            let icon = self.select_icon(&entity.record, None);
            if icon.color == entity.applied_color {
                continue;
            }
            surface.set_icon(entity.handle, &icon);
            entity.applied_color = icon.color.clone();
            reapplied += 1;
        }

        tracing::debug!("Icon refresh re-applied {} marker(s)", reapplied);
        reapplied
    }
}
