//! Worldmap2d Library - Data Synchronisation Core for a 2D World Map
//!
//! This library keeps records coming from external datasets in sync with the entities a
//! map renders. Records arrive and leave through notifications, are turned into point or
//! polygon geometry, and are mirrored as markers and areas grouped in one layer per source.
//! Rendering, routing, geocoding and data descriptions are external capabilities reached
//! through the narrow traits in [`surface`] and [`capability`].
//!
//! # Architecture
//!
//! - **[`FeatureBuilder`]**: record to [`GeoFeature`] using one of three resolution strategies
//! - **[`MarkerRegistry`]**: `(source, id)` to rendered entity and `source` to [`Layer`]
//! - **Visibility** ([`visibility`]): display-only filtering over the registry
//! - **[`IconResolver`]**: icon selection and change-detecting refresh
//! - **[`InteractionGate`]**: map input enable/disable and click-handler set swapping
//! - **[`EventBus`]**: typed publish/subscribe for everything the map emits
//! - **[`Worldmap2d`]**: owns the collaborators and routes notifications through them
//! - **[`navigation`]**: start/waypoint/destination planning on top of the map

pub mod capability;
mod component;
pub mod config;
pub mod events;
mod feature;
pub mod geodesy;
#[cfg(feature = "http")]
pub mod http;
mod icons;
mod interaction;
mod models;
pub mod navigation;
mod record;
mod registry;
pub mod surface;
mod template;
pub mod visibility;

// Public API exports
pub use capability::{
    DataDescription, Geocoder, Instruction, ModelSource, RoutePlan, RoutePointRecord, RouteStore, Router,
};
pub use component::{ContextAction, DatasetOutcome, UserPosition, Worldmap2d};
pub use config::{DatasourceConfig, MapConfig, NavigationConfig};
pub use events::{DatasetEvent, EventBus, InputEvent, MapEvent, SubscriptionId};
pub use feature::{FeatureBuilder, GeoFeature, Geometry};
pub use icons::{ColorToken, IconResolver};
pub use interaction::{ClickHandlerSet, EmitEvents, HandlerSetId, InteractionGate, InteractionState};
pub use models::{ModelRequest, ModelTracker};
pub use record::{FieldPath, Record, RecordKey};
pub use registry::{EntityKind, Layer, MarkerRegistry, RenderedEntity};
pub use surface::{
    AreaStyle, EntityHandle, IconSpec, Interaction, LayerHandle, LineStyle, MapSurface,
    RecordingSurface, Tooltip,
};
pub use template::render_template;

/// Error types for the map core
///
/// Every variant is recovered where it is detected: the caller logs it and the affected
/// action becomes a no-op, leaving the registry consistent.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Record {key} is missing attribute '{attribute}'")]
    MissingAttribute { key: RecordKey, attribute: String },

    #[error("Invalid geometry for record {key}: {reason}")]
    InvalidGeometry { key: RecordKey, reason: String },

    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),

    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Navigation incomplete: {0}")]
    NavigationIncomplete(String),

    #[error("Export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, MapError>;
