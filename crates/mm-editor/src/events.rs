//! Notifications from the engine to host-owned panels.
//!
//! Side panels (notes, sources, chat) subscribe to an `EventBus` and react to
//! `EngineEvent`s instead of reaching into the engine. Subscribers run
//! synchronously, in subscription order, after the mutation is committed.

use mm_core::{LayoutDirection, NodeField, NodeId};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Attributes of an existing node changed.
    NodeChanged {
        id: NodeId,
        fields: SmallVec<[NodeField; 4]>,
    },
    /// A subtree was removed. `root` is the topmost removed node and
    /// `parent` the node it hung from.
    NodesRemoved {
        root: NodeId,
        parent: Option<NodeId>,
        removed: Vec<NodeId>,
    },
    LayoutChanged { direction: LayoutDirection },
    Saved,
    PersistenceFailed { message: String },
}

impl EngineEvent {
    /// Whether a panel showing `panel_node` should close. Removal takes the
    /// whole subtree, so a removed parent implies a removed `panel_node`.
    pub fn closes(&self, panel_node: NodeId) -> bool {
        match self {
            Self::NodesRemoved { removed, .. } => removed.contains(&panel_node),
            _ => false,
        }
    }
}

pub type Subscriber = Box<dyn FnMut(&EngineEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        log::trace!("emit {event:?}");
        for (_, subscriber) in &mut self.subscribers {
            subscriber(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn removed(ids: &[NodeId]) -> EngineEvent {
        EngineEvent::NodesRemoved {
            root: ids[0],
            parent: None,
            removed: ids.to_vec(),
        }
    }

    #[test]
    fn panel_closes_when_its_node_is_removed() {
        let a = NodeId::intern("ev-a");
        let b = NodeId::intern("ev-b");
        let c = NodeId::intern("ev-c");
        let event = removed(&[a, b]);

        assert!(event.closes(a));
        assert!(event.closes(b));
        assert!(!event.closes(c));
        assert!(!EngineEvent::Saved.closes(a));
    }

    #[test]
    fn subscribers_receive_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let first = Rc::clone(&log);
        bus.subscribe(move |e| first.borrow_mut().push(format!("1:{e:?}")));
        let second = Rc::clone(&log);
        let id = bus.subscribe(move |_| second.borrow_mut().push("2".to_string()));

        bus.emit(&EngineEvent::Saved);
        assert_eq!(*log.borrow(), vec!["1:Saved".to_string(), "2".to_string()]);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&EngineEvent::Saved);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(bus.len(), 1);
    }
}
