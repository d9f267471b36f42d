//! Subscription-based notification dispatch.

use std::fmt;
use std::hash::Hash;

use crate::pick::{PickEvent, PickEventKind};

/// Events that can be filtered by kind.
pub trait EventKind {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn event_kind(&self) -> Self::Kind;
}

impl EventKind for PickEvent {
    type Kind = PickEventKind;

    fn event_kind(&self) -> PickEventKind {
        self.kind()
    }
}

/// Token returned by [`EventHub::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Handler<E: EventKind> {
    token: Subscription,
    kind: Option<E::Kind>,
    callback: Box<dyn FnMut(&E)>,
}

/// Dispatches events to subscribed callbacks in subscription order.
pub struct EventHub<E: EventKind> {
    handlers: Vec<Handler<E>>,
    next_token: u64,
}

impl<E: EventKind> Default for EventHub<E> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            next_token: 0,
        }
    }
}

impl<E: EventKind> fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<E: EventKind> EventHub<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: Option<E::Kind>, callback: Box<dyn FnMut(&E)>) -> Subscription {
        self.next_token += 1;
        let token = Subscription(self.next_token);
        self.handlers.push(Handler {
            token,
            kind,
            callback,
        });
        token
    }

    /// Calls `callback` for every event of `kind`.
    pub fn subscribe(&mut self, kind: E::Kind, callback: impl FnMut(&E) + 'static) -> Subscription {
        self.add(Some(kind), Box::new(callback))
    }

    /// Calls `callback` for every event.
    pub fn subscribe_all(&mut self, callback: impl FnMut(&E) + 'static) -> Subscription {
        self.add(None, Box::new(callback))
    }

    /// Returns `false` when the token was not subscribed.
    pub fn unsubscribe(&mut self, token: Subscription) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.token != token);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        let kind = event.event_kind();
        for handler in &mut self.handlers {
            if handler.kind.is_none_or(|k| k == kind) {
                (handler.callback)(event);
            }
        }
    }

    pub fn emit_all<'a>(&mut self, events: impl IntoIterator<Item = &'a E>)
    where
        E: 'a,
    {
        for event in events {
            self.emit(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_kind_filter_and_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::<PickEvent>::new();

        let enter_log = Rc::clone(&log);
        hub.subscribe(PickEventKind::Enter, move |e| {
            enter_log.borrow_mut().push(format!("enter:{:?}", e.id()));
        });
        let all_log = Rc::clone(&log);
        hub.subscribe_all(move |e| all_log.borrow_mut().push(format!("{:?}", e.kind())));

        hub.emit_all(&[PickEvent::Enter(1), PickEvent::Clear]);

        assert_eq!(
            *log.borrow(),
            vec!["enter:Some(1)", "Enter", "Clear"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut hub = EventHub::<PickEvent>::new();
        let c = Rc::clone(&count);
        let token = hub.subscribe(PickEventKind::Click, move |_| *c.borrow_mut() += 1);

        hub.emit(&PickEvent::Click(4));
        assert!(hub.unsubscribe(token));
        assert!(!hub.unsubscribe(token));
        hub.emit(&PickEvent::Click(4));

        assert_eq!(*count.borrow(), 1);
        assert!(hub.is_empty());
    }
}
