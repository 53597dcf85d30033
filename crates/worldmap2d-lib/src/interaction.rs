//! Interaction Gate - map input switches and click-handler sets
//!
//! Two switches gate input: map clicks alone, and every interaction as a unit (dragging,
//! zooming, keyboard and clicks). Clicks are dispatched to the active [`ClickHandlerSet`],
//! which is either the default set or a temporary override installed by a plugin. Every
//! registered entity carries the id of the set it is bound to and only dispatches while that
//! set is active.

use crate::surface::{Interaction, MapSurface};
use crate::{EventBus, MapEvent, MarkerRegistry, Record};
use geo::Point;
use std::fmt;

/// Identifies an installed click-handler set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerSetId(u32);

impl HandlerSetId {
    pub const DEFAULT: Self = Self(0);

    #[inline]
    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl fmt::Display for HandlerSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("default")
        } else {
            write!(f, "override#{}", self.0)
        }
    }
}

/// Callbacks receiving map and marker clicks
pub trait ClickHandlerSet: Send {
    fn name(&self) -> &str;
    fn on_map_click(&mut self, position: Point<f64>, events: &mut EventBus);
    fn on_marker_click(&mut self, record: &Record, events: &mut EventBus);
}

/// Default handlers: publish clicks on the event bus
#[derive(Debug, Default)]
pub struct EmitEvents;

impl ClickHandlerSet for EmitEvents {
    fn name(&self) -> &str {
        "default"
    }

    fn on_map_click(&mut self, position: Point<f64>, events: &mut EventBus) {
        events.emit(MapEvent::MapClicked { position });
    }

    fn on_marker_click(&mut self, record: &Record, events: &mut EventBus) {
        events.emit(MapEvent::MarkerClicked {
            key: record.key().clone(),
        });
    }
}

/// Snapshot of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionState {
    pub map_interactions: bool,
    pub map_click_interaction: bool,
    pub active_handlers: HandlerSetId,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            map_interactions: true,
            map_click_interaction: true,
            active_handlers: HandlerSetId::DEFAULT,
        }
    }
}

pub struct InteractionGate {
    state: InteractionState,
    default_set: Box<dyn ClickHandlerSet>,
    override_set: Option<Box<dyn ClickHandlerSet>>,
    next_id: u32,
}

impl Default for InteractionGate {
    fn default() -> Self {
        Self::new(Box::new(EmitEvents))
    }
}

impl fmt::Debug for InteractionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionGate")
            .field("state", &self.state)
            .field("default_set", &self.default_set.name())
            .field("override_set", &self.override_set.as_ref().map(|s| s.name()))
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl InteractionGate {
    pub fn new(default_set: Box<dyn ClickHandlerSet>) -> Self {
        Self {
            state: InteractionState::default(),
            default_set,
            override_set: None,
            next_id: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Binding for newly registered entities
    #[inline]
    pub fn active_binding(&self) -> HandlerSetId {
        self.state.active_handlers
    }

    /// Stop map clicks from reaching any handler. Returns whether the state changed.
    pub fn disable_click_interaction(&mut self, events: &mut EventBus) -> bool {
        if !self.state.map_click_interaction {
            return false;
        }
        self.state.map_click_interaction = false;
        events.emit(MapEvent::ClickInteractionDisabled);
        true
    }

    pub fn enable_click_interaction(&mut self, events: &mut EventBus) -> bool {
        if self.state.map_click_interaction {
            return false;
        }
        self.state.map_click_interaction = true;
        events.emit(MapEvent::ClickInteractionEnabled);
        true
    }

    pub fn toggle_click_interaction(&mut self, events: &mut EventBus) -> bool {
        if self.state.map_click_interaction {
            self.disable_click_interaction(events)
        } else {
            self.enable_click_interaction(events)
        }
    }

    /// Disable clicks and every surface interaction before returning
    pub fn disable_all_interactions(&mut self, surface: &mut dyn MapSurface, events: &mut EventBus) -> bool {
        if !self.state.map_interactions {
            return false;
        }
        self.disable_click_interaction(events);
        for interaction in Interaction::ALL {
            surface.set_interaction(interaction, false);
        }
        self.state.map_interactions = false;
        events.emit(MapEvent::InteractionsDisabled);
        true
    }

    pub fn enable_all_interactions(&mut self, surface: &mut dyn MapSurface, events: &mut EventBus) -> bool {
        if self.state.map_interactions {
            return false;
        }
        self.enable_click_interaction(events);
        for interaction in Interaction::ALL {
            surface.set_interaction(interaction, true);
        }
        self.state.map_interactions = true;
        events.emit(MapEvent::InteractionsEnabled);
        true
    }

    /// Install `set` as the active handlers and rebind every registered entity to it
    ///
    /// An already active override is replaced.
    pub fn activate_override_handlers(
        &mut self,
        set: Box<dyn ClickHandlerSet>,
        registry: &mut MarkerRegistry,
        events: &mut EventBus,
    ) -> HandlerSetId {
        self.next_id += 1;
        let id = HandlerSetId(self.next_id);
        tracing::debug!("Activating click handlers '{}' as {}", set.name(), id);
        self.override_set = Some(set);
        self.state.active_handlers = id;
        registry.rebind_all(id);
        events.emit(MapEvent::HandlersChanged { active: id });
        id
    }

    /// Go back to the default handlers. Returns whether an override was active.
    pub fn restore_default_handlers(&mut self, registry: &mut MarkerRegistry, events: &mut EventBus) -> bool {
        if self.state.active_handlers.is_default() {
            return false;
        }
        if let Some(set) = self.override_set.take() {
            tracing::debug!("Restoring default click handlers, dropping '{}'", set.name());
        }
        self.state.active_handlers = HandlerSetId::DEFAULT;
        registry.rebind_all(HandlerSetId::DEFAULT);
        events.emit(MapEvent::HandlersChanged {
            active: HandlerSetId::DEFAULT,
        });
        true
    }

    fn active_set(&mut self) -> &mut dyn ClickHandlerSet {
        match self.override_set.as_mut() {
            Some(set) if !self.state.active_handlers.is_default() => set.as_mut(),
            _ => self.default_set.as_mut(),
        }
    }

    /// Route a map click to the active handlers. Returns whether a handler ran.
    pub fn dispatch_map_click(&mut self, position: Point<f64>, events: &mut EventBus) -> bool {
        if !self.state.map_click_interaction {
            tracing::trace!("Map click ignored, click interaction disabled");
            return false;
        }
        self.active_set().on_map_click(position, events);
        true
    }

    /// Route a marker click to the active handlers if the marker is bound to them
    pub fn dispatch_marker_click(
        &mut self,
        binding: HandlerSetId,
        record: &Record,
        events: &mut EventBus,
    ) -> bool {
        if !self.state.map_interactions {
            tracing::trace!("Marker click ignored, map interactions disabled");
            return false;
        }
        if binding != self.state.active_handlers {
            tracing::warn!(
                "Marker {} is bound to {} but {} is active, click dropped",
                record.key(),
                binding,
                self.state.active_handlers
            );
            return false;
        }
        self.active_set().on_marker_click(record, events);
        true
    }
}
