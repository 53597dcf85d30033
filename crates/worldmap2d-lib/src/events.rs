//! Events flowing into and out of the map
//!
//! [`DatasetEvent`] and [`InputEvent`] are what the component consumes: dataset change
//! notifications and raw input from the surface. [`MapEvent`] is what it emits through the
//! [`EventBus`], where callbacks run in registration order and pollers can drain the
//! pending queue.

use crate::{EntityHandle, HandlerSetId, Record, RecordKey};
use geo::{Point, Rect};

/// Change notifications from the datasets feeding the map
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetEvent {
    RecordAdded(Record),
    RecordRemoved(RecordKey),
    /// A field of an already added record changed; carries the full new state
    AttributeChanged(Record),
    /// The linked data description changed its color assignments
    DataDescriptionChanged,
}

/// Raw input reported by the surface
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MapClick { position: Point<f64> },
    MarkerClick { entity: EntityHandle },
    /// The view finished moving
    MoveEnd { bounds: Rect<f64>, zoom: f64 },
}

/// Everything the map emits
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    MapClicked { position: Point<f64> },
    MarkerClicked { key: RecordKey },
    ViewportChanged { bounds: Rect<f64>, zoom: f64 },
    InteractionsDisabled,
    InteractionsEnabled,
    ClickInteractionDisabled,
    ClickInteractionEnabled,
    HandlersChanged { active: HandlerSetId },
    UserLocationChanged { position: Point<f64> },
}

/// Identifies a subscription for [`EventBus::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&MapEvent) + Send>;

/// Ordered publish/subscribe for [`MapEvent`]s
///
/// Emitted events are also queued until [`EventBus::drain`] is called.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
    events: Vec<MapEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&MapEvent) + Send + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, event: MapEvent) {
        tracing::trace!("Emitting {:?}", event);
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&event);
        }
        self.events.push(event);
    }

    /// Events emitted since the last drain
    pub fn events(&self) -> &[MapEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("pending", &self.events.len())
            .finish()
    }
}
