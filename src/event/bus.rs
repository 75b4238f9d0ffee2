use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

type Listener<E> = Rc<RefCell<dyn FnMut(&E)>>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A typed publish/subscribe bus.
///
/// Listeners run in subscription order. A listener that panics is logged and
/// skipped; the remaining listeners still receive the event.
pub struct EventBus<E> {
    listeners: RefCell<Vec<(SubscriptionId, Listener<E>)>>,
    next_id: Cell<u64>,
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &format!("<{} listeners>", self.listeners.borrow().len()))
            .finish()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    /// Creates a new event bus
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Subscribe a listener to receive every emitted event
    pub fn subscribe(&self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let listener: Listener<E> = Rc::new(RefCell::new(listener));
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Emit an event to all registered listeners
    pub fn emit(&self, event: &E) {
        // Listeners may subscribe or unsubscribe while we dispatch.
        let snapshot: Vec<(SubscriptionId, Listener<E>)> = self.listeners.borrow().clone();

        for (id, listener) in snapshot {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                log::warn!("Skipping re-entrant dispatch to listener {:?}", id);
                continue;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (&mut *listener)(event)));
            if outcome.is_err() {
                log::error!("Event listener {:?} panicked; continuing with the rest", id);
            }
        }
    }
}

impl<E: Clone + 'static> EventBus<E> {
    /// Subscribe a queue that collects every event for later processing.
    pub fn inbox(&self) -> (SubscriptionId, EventInbox<E>) {
        let inbox = EventInbox {
            queue: Rc::new(RefCell::new(VecDeque::new())),
        };
        let queue = Rc::clone(&inbox.queue);
        let id = self.subscribe(move |event: &E| queue.borrow_mut().push_back(event.clone()));
        (id, inbox)
    }
}

/// Events collected by [`EventBus::inbox`], waiting to be drained.
pub struct EventInbox<E> {
    queue: Rc<RefCell<VecDeque<E>>>,
}

impl<E> std::fmt::Debug for EventInbox<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventInbox")
            .field("pending", &self.queue.borrow().len())
            .finish()
    }
}

impl<E> EventInbox<E> {
    pub fn drain(&self) -> Vec<E> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_receive_events_in_order() {
        let bus = EventBus::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&seen);
        bus.subscribe(move |e| a.borrow_mut().push(("a", *e)));
        let b = Rc::clone(&seen);
        bus.subscribe(move |e| b.borrow_mut().push(("b", *e)));

        bus.emit(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::<u32>::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = bus.subscribe(move |_| c.set(c.get() + 1));

        bus.emit(&1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&2);

        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus = EventBus::<u32>::new();
        let reached = Rc::new(Cell::new(false));

        bus.subscribe(|_| panic!("listener failure"));
        let r = Rc::clone(&reached);
        bus.subscribe(move |_| r.set(true));

        bus.emit(&0);
        assert!(reached.get());
    }

    #[test]
    fn inbox_collects_until_drained() {
        let bus = EventBus::<&'static str>::new();
        let (_, inbox) = bus.inbox();

        bus.emit(&"one");
        bus.emit(&"two");
        assert_eq!(inbox.drain(), vec!["one", "two"]);
        assert!(inbox.is_empty());
    }
}
