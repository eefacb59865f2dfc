//! Notifications between the renderer and its observers
//!
//! The renderer never calls the outline directly. It publishes
//! [`Notification`]s on a [`Bus`]; observers subscribe and react on their own
//! schedule. [`FrameGate`] collapses any number of requests within one frame
//! into a single unit of work.

use std::cell::RefCell;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Something happened to rendered content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A table / combo-list region finished rendering
    TableRendered { root_id: String, region_id: String },
    /// The children of a rendered subtree changed
    ContentChanged { root_id: String },
}

/// Broadcast channel for [`Notification`]s
#[derive(Debug, Default)]
pub struct Bus {
    subscribers: RefCell<Vec<Sender<Notification>>>,
}

impl Bus {
    /// Create a bus without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every notification published from now on
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = channel();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    /// Deliver to every live subscriber; dropped subscribers are forgotten
    pub fn publish(&self, notification: Notification) {
        log::debug!("publish {:?}", notification);
        self.subscribers
            .borrow_mut()
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }

    /// Number of live subscribers as of the last publish
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

/// At most one pending unit of work per frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameGate {
    pending: bool,
    coalesced: usize,
}

impl FrameGate {
    /// Ask for work in the next frame; returns `true` if this request
    /// scheduled it and `false` if it was already pending
    pub fn request(&mut self) -> bool {
        if self.pending {
            self.coalesced += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Whether work is scheduled
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending work, if any
    pub fn take(&mut self) -> bool {
        let was_pending = self.pending;
        self.pending = false;
        self.coalesced = 0;
        was_pending
    }

    /// Requests folded into the pending one
    pub fn coalesced(&self) -> usize {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let bus = Bus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(Notification::ContentChanged {
            root_id: "main".to_string(),
        });

        assert_eq!(first.try_iter().count(), 1);
        assert_eq!(second.try_iter().count(), 1);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = Bus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(Notification::ContentChanged {
            root_id: "main".to_string(),
        });

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }

    #[test]
    fn test_frame_gate_coalesces() {
        let mut gate = FrameGate::default();
        assert!(gate.request());
        assert!(!gate.request());
        assert!(!gate.request());
        assert_eq!(gate.coalesced(), 2);

        assert!(gate.take());
        assert!(!gate.take());
        assert!(!gate.is_pending());
    }
}
