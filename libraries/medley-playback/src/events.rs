//! Per-entity event bus and the piece event vocabulary
//!
//! Every stateful entity owns its own [`EventBus`]. Handlers are delivered
//! events in registration order and receive a reaction context alongside the
//! event: listeners request state changes (stop, pause) through the context
//! and the owning entity applies them after dispatch. This keeps dispatch
//! re-entrancy free while preserving "a listener may stop the piece
//! mid-advance" semantics.

use serde::{Deserialize, Serialize};

/// Events emitted by a piece over its lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PieceEvent {
    /// Playback started (or resumed)
    Play,

    /// Playback paused mid-section
    Pause,

    /// Playback stopped; cursor and visitation state reset
    Stop,

    /// All owned tracks muted
    Mute,

    /// All owned tracks unmuted; logical gain restored
    Unmute,

    /// The piece's logical volume changed
    Volume {
        /// New gain in 0.0-1.0
        gain: f32,
    },

    /// A new section started sounding
    SectionBegin {
        /// Section set index
        set: usize,
        /// Section index within the set
        section: usize,
    },

    /// The current section reached its terminal point
    /// (natural end, or the overlap point when overlaps are in use)
    SectionEnd {
        /// Section set index
        set: usize,
        /// Section index within the set
        section: usize,
    },

    /// A new cycle began (entering set 0)
    CycleBegin,

    /// The last set's section reached its terminal point
    CycleEnd,

    /// Every completable cycle has been exhausted; visitation was reinstated
    FullCycle,

    /// Early warning ahead of the final section's end
    Finale,

    /// The piece finished on its own (auto-stop)
    End,
}

/// Identifier for a bus subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

enum Mode {
    Persistent,
    Once,
}

struct Subscriber<E, C> {
    id: SubscriberId,
    key: Option<String>,
    mode: Mode,
    fired: bool,
    handler: Box<dyn FnMut(&E, &mut C)>,
}

/// Publish/subscribe bus scoped to a single entity
///
/// Three subscription modes:
/// - [`subscribe`](Self::subscribe): plain, fires on every emission
/// - [`subscribe_replacing`](Self::subscribe_replacing): keyed; re-subscribing
///   under the same key replaces the handler in place (idempotent)
/// - [`subscribe_once`](Self::subscribe_once): fires once, then detaches
pub struct EventBus<E, C> {
    subscribers: Vec<Subscriber<E, C>>,
    next_id: u64,
}

impl<E, C> EventBus<E, C> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Subscribe a handler that fires on every emission
    pub fn subscribe(&mut self, handler: impl FnMut(&E, &mut C) + 'static) -> SubscriberId {
        let id = self.allocate_id();
        self.subscribers.push(Subscriber {
            id,
            key: None,
            mode: Mode::Persistent,
            fired: false,
            handler: Box::new(handler),
        });
        id
    }

    /// Subscribe a handler under a key, replacing any handler already
    /// registered under that key. The replaced handler keeps its original
    /// registration slot, so delivery order is stable across re-subscription.
    pub fn subscribe_replacing(
        &mut self,
        key: &str,
        handler: impl FnMut(&E, &mut C) + 'static,
    ) -> SubscriberId {
        if let Some(existing) = self
            .subscribers
            .iter_mut()
            .find(|s| s.key.as_deref() == Some(key))
        {
            existing.handler = Box::new(handler);
            existing.fired = false;
            return existing.id;
        }

        let id = self.allocate_id();
        self.subscribers.push(Subscriber {
            id,
            key: Some(key.to_string()),
            mode: Mode::Persistent,
            fired: false,
            handler: Box::new(handler),
        });
        id
    }

    /// Subscribe a handler that fires on the next emission only
    pub fn subscribe_once(&mut self, handler: impl FnMut(&E, &mut C) + 'static) -> SubscriberId {
        let id = self.allocate_id();
        self.subscribers.push(Subscriber {
            id,
            key: None,
            mode: Mode::Once,
            fired: false,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a subscription by id. Returns true if it existed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Remove a keyed subscription. Returns true if it existed.
    pub fn unsubscribe_key(&mut self, key: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.key.as_deref() != Some(key));
        self.subscribers.len() != before
    }

    /// Deliver an event to every subscriber in registration order.
    ///
    /// Once-subscribers are detached after firing.
    pub fn emit(&mut self, event: &E, context: &mut C) {
        for subscriber in &mut self.subscribers {
            (subscriber.handler)(event, context);
            subscriber.fired = true;
        }
        self.subscribers
            .retain(|s| !(matches!(s.mode, Mode::Once) && s.fired));
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if the bus has no subscriptions
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Remove every subscription
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

impl<E, C> Default for EventBus<E, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, C> std::fmt::Debug for EventBus<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recorder(log: &Log, tag: &'static str) -> impl FnMut(&u32, &mut ()) {
        let log = Rc::clone(log);
        move |_, ()| log.borrow_mut().push(tag)
    }

    #[test]
    fn delivery_in_registration_order() {
        let log: Log = Rc::default();
        let mut bus: EventBus<u32, ()> = EventBus::new();

        bus.subscribe(recorder(&log, "first"));
        bus.subscribe(recorder(&log, "second"));
        bus.subscribe(recorder(&log, "third"));

        bus.emit(&0, &mut ());
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn once_detaches_after_firing() {
        let log: Log = Rc::default();
        let mut bus: EventBus<u32, ()> = EventBus::new();

        bus.subscribe_once(recorder(&log, "once"));
        bus.subscribe(recorder(&log, "always"));

        bus.emit(&0, &mut ());
        bus.emit(&0, &mut ());

        assert_eq!(*log.borrow(), vec!["once", "always", "always"]);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn replacing_is_idempotent() {
        let log: Log = Rc::default();
        let mut bus: EventBus<u32, ()> = EventBus::new();

        bus.subscribe_replacing("auto", recorder(&log, "old"));
        bus.subscribe(recorder(&log, "plain"));
        bus.subscribe_replacing("auto", recorder(&log, "new"));

        bus.emit(&0, &mut ());

        // One handler under the key, in its original slot
        assert_eq!(bus.len(), 2);
        assert_eq!(*log.borrow(), vec!["new", "plain"]);
    }

    #[test]
    fn unsubscribe_by_id_and_key() {
        let log: Log = Rc::default();
        let mut bus: EventBus<u32, ()> = EventBus::new();

        let id = bus.subscribe(recorder(&log, "plain"));
        bus.subscribe_replacing("keyed", recorder(&log, "keyed"));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.unsubscribe_key("keyed"));
        assert!(bus.is_empty());
    }

    #[test]
    fn handlers_see_reaction_context() {
        let mut bus: EventBus<u32, Vec<u32>> = EventBus::new();
        bus.subscribe(|event, requests: &mut Vec<u32>| requests.push(*event * 2));

        let mut requests = Vec::new();
        bus.emit(&21, &mut requests);
        assert_eq!(requests, vec![42]);
    }

    #[test]
    fn piece_event_serializes() {
        let event = PieceEvent::SectionBegin { set: 1, section: 3 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SectionBegin"));

        let back: PieceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
