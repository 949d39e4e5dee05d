//! Slot lifecycle event wiring
//!
//! The item store broadcasts lifecycle events through an explicit registry
//! with opaque subscription tokens. Subscribers must unsubscribe on
//! teardown; dropping a token without unsubscribing leaves a dead callback
//! in the registry until it is removed.

use crate::core::types::{ItemId, SlotId};

/// Item lifecycle events raised by the item store
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent {
    AddedToSlot {
        slot: SlotId,
        item: ItemId,
    },
    RemovedFromSlot {
        slot: SlotId,
        item: ItemId,
    },
    /// An item was socketed into another item already sitting in a slot
    AttachedToSocket {
        owner_slot: SlotId,
        owner_item: ItemId,
        socket_slot: SlotId,
        socket_item: ItemId,
    },
}

/// Opaque handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SlotCallback = Box<dyn FnMut(&SlotEvent)>;

/// Callback registry owned by the item-store side of the wiring
#[derive(Default)]
pub struct SlotEventRegistry {
    subscribers: Vec<(SubscriptionId, SlotCallback)>,
    next_id: u64,
}

impl SlotEventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&SlotEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the token was already removed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to all subscribers in subscription order
    pub fn broadcast(&mut self, event: &SlotEvent) {
        for (_, callback) in &mut self.subscribers {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_broadcast_unsubscribe() {
        let mut registry = SlotEventRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        let token = registry.subscribe(move |event| {
            seen_clone.borrow_mut().push(event.clone());
        });

        let event = SlotEvent::AddedToSlot {
            slot: SlotId::new("Back"),
            item: ItemId::new(),
        };
        registry.broadcast(&event);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], event);

        assert!(registry.unsubscribe(token));
        assert!(!registry.unsubscribe(token));
        registry.broadcast(&event);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_subscribers_called_in_order() {
        let mut registry = SlotEventRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let order_clone = order.clone();
            registry.subscribe(move |_| order_clone.borrow_mut().push(tag));
        }

        registry.broadcast(&SlotEvent::RemovedFromSlot {
            slot: SlotId::new("Back"),
            item: ItemId::new(),
        });
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }
}
