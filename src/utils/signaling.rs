//! Signaling system
//!
//! A [`Signaler`] delivers events of a single type to all callbacks currently registered on it.
//! Registering a callback returns a [`SignalToken`]; the callback stays registered as long as
//! the token is alive and is detached as soon as it is dropped. Detaching is therefore idempotent
//! and safe at any point, including from inside a callback of the same signaler.
//!
//! Everything here is `!Send`: signals are meant to be emitted and handled on the thread
//! dispatching the wayland display.
//!
//! Emitting a signal from within one of its own callbacks does not recurse: the event is queued
//! and delivered once the current round of callbacks has completed.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
};

type Callback<S> = Weak<RefCell<dyn FnMut(&S)>>;

struct SignalInner<S> {
    callbacks: RefCell<Vec<Callback<S>>>,
    pending_events: RefCell<VecDeque<S>>,
    sending: Cell<bool>,
}

/// An event source delivering `S` to registered callbacks
pub struct Signaler<S> {
    inner: Rc<SignalInner<S>>,
}

impl<S> fmt::Debug for Signaler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signaler")
            .field("callbacks", &self.inner.callbacks.borrow().len())
            .field("pending_events", &self.inner.pending_events.borrow().len())
            .finish()
    }
}

impl<S> Clone for Signaler<S> {
    fn clone(&self) -> Signaler<S> {
        Signaler {
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static> Default for Signaler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> Signaler<S> {
    /// Create a new signaler without any callbacks
    pub fn new() -> Signaler<S> {
        Signaler {
            inner: Rc::new(SignalInner {
                callbacks: RefCell::new(Vec::new()),
                pending_events: RefCell::new(VecDeque::new()),
                sending: Cell::new(false),
            }),
        }
    }

    /// Register a callback on this signaler
    ///
    /// The callback is invoked for every event sent while the returned [`SignalToken`] is alive.
    /// A callback registered while an event is being delivered only receives later events.
    #[must_use = "the callback is detached once the token is dropped"]
    pub fn register<F: FnMut(&S) + 'static>(&self, f: F) -> SignalToken {
        let callback = Rc::new(RefCell::new(f));
        let weak: Weak<RefCell<F>> = Rc::downgrade(&callback);
        let weak: Callback<S> = weak;
        self.inner.callbacks.borrow_mut().push(weak);
        SignalToken { _callback: callback }
    }

    /// Send an event to all registered callbacks
    pub fn signal(&self, event: S) {
        self.inner.pending_events.borrow_mut().push_back(event);
        if self.inner.sending.get() {
            return;
        }

        self.inner.sending.set(true);
        loop {
            let Some(event) = self.inner.pending_events.borrow_mut().pop_front() else {
                break;
            };
            let callbacks = self.inner.callbacks.borrow().clone();
            for callback in callbacks {
                if let Some(callback) = callback.upgrade() {
                    let mut callback = callback.borrow_mut();
                    (&mut *callback)(&event);
                }
            }
            self.inner
                .callbacks
                .borrow_mut()
                .retain(|callback| callback.strong_count() > 0);
        }
        self.inner.sending.set(false);
    }

    /// Number of callbacks still attached to this signaler
    pub fn listener_count(&self) -> usize {
        self.inner
            .callbacks
            .borrow()
            .iter()
            .filter(|callback| callback.strong_count() > 0)
            .count()
    }
}

/// Registration of a callback on a [`Signaler`]
///
/// Dropping the token detaches the callback.
pub struct SignalToken {
    _callback: Rc<dyn Any>,
}

impl fmt::Debug for SignalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalToken").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_all_callbacks() {
        let signaler = Signaler::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = signaler.register({
            let seen = seen.clone();
            move |v| seen.borrow_mut().push(("first", *v))
        });
        let second = signaler.register({
            let seen = seen.clone();
            move |v| seen.borrow_mut().push(("second", *v))
        });

        signaler.signal(7);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
        assert_eq!(signaler.listener_count(), 2);

        drop(first);
        drop(second);
    }

    #[test]
    fn dropping_token_detaches() {
        let signaler = Signaler::<()>::new();
        let count = Rc::new(Cell::new(0));

        let token = signaler.register({
            let count = count.clone();
            move |_| count.set(count.get() + 1)
        });
        signaler.signal(());
        drop(token);
        signaler.signal(());

        assert_eq!(count.get(), 1);
        assert_eq!(signaler.listener_count(), 0);
    }

    #[test]
    fn detach_from_inside_callback() {
        let signaler = Signaler::<()>::new();
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<SignalToken>>> = Rc::new(RefCell::new(None));

        let token = signaler.register({
            let count = count.clone();
            let slot = slot.clone();
            move |_| {
                count.set(count.get() + 1);
                slot.borrow_mut().take();
            }
        });
        *slot.borrow_mut() = Some(token);

        signaler.signal(());
        signaler.signal(());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn reentrant_signal_is_queued() {
        let signaler = Signaler::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _token = signaler.register({
            let seen = seen.clone();
            let signaler = signaler.clone();
            move |v| {
                seen.borrow_mut().push(*v);
                if *v == 1 {
                    signaler.signal(2);
                    // not delivered yet
                    assert_eq!(seen.borrow().len(), 1);
                }
            }
        });

        signaler.signal(1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
