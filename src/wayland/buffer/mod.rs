//! Buffer management utilities.
//!
//! This module provides the [`Buffer`] type, a renderer-agnostic, reference-counted handle to the
//! contents of a client buffer, and the [`resource`] registry deciding how a client resource is
//! turned into one.
//!
//! The lifetime of a [`Buffer`] is governed by two kinds of references:
//!
//! - the *producer* reference, held by whoever created the buffer (usually an adapter mirroring
//!   a client resource). It is given up through [`Buffer::drop_buffer`], once the backing resource
//!   is gone.
//! - any number of *locks*, held by consumers (like a renderer) while they access the contents,
//!   obtained through [`Buffer::lock`]. Whenever the last lock is released the `release` signal
//!   is emitted, telling the producer it may reuse the contents.
//!
//! Once the producer reference is dropped and no locks remain, the buffer is destroyed: the
//! `destroy` signal is emitted and the [`BufferImpl`] backing the buffer is dropped. Handles
//! may outlive this point, but they then refer to a dead buffer.

use std::{
    cell::{Cell, Ref, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use downcast_rs::{impl_downcast, Downcast};
use tracing::{trace, warn};

use crate::{
    backend::allocator::dmabuf::DmabufAttributes,
    utils::{
        signaling::{SignalToken, Signaler},
        IsAlive,
    },
};

pub mod resource;

/// Operations a specific kind of buffer provides to the generic [`Buffer`].
///
/// Dropping the implementation is the destruction of the buffer, it happens exactly once.
pub trait BufferImpl: Downcast + fmt::Debug {
    /// Describe the buffer as dmabuf, if it can be accessed that way
    fn dmabuf(&self, buffer: &Buffer) -> Option<DmabufAttributes> {
        let _ = buffer;
        None
    }
}
impl_downcast!(BufferImpl);

struct BufferInner {
    width: i32,
    height: i32,
    dropped: Cell<bool>,
    locks: Cell<usize>,
    destroyed: Cell<bool>,
    release: Signaler<()>,
    destroy: Signaler<()>,
    implementation: RefCell<Option<Box<dyn BufferImpl>>>,
}

/// Reference-counted handle to a buffer
#[derive(Clone)]
pub struct Buffer(Rc<BufferInner>);

/// Weak reference to a [`Buffer`]
#[derive(Clone)]
pub struct WeakBuffer(Weak<BufferInner>);

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("width", &self.0.width)
            .field("height", &self.0.height)
            .field("dropped", &self.0.dropped.get())
            .field("locks", &self.0.locks.get())
            .field("destroyed", &self.0.destroyed.get())
            .field("implementation", &self.0.implementation.try_borrow().ok())
            .finish()
    }
}

impl fmt::Debug for WeakBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakBuffer").field(&self.0.as_ptr()).finish()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Buffer {}

impl Buffer {
    /// Create a new buffer of the given size.
    ///
    /// `init` is called with the new handle before the implementation is installed, so the
    /// implementation can attach itself to the buffers signals.
    ///
    /// The returned handle carries the producer reference, see [`Buffer::drop_buffer`].
    pub fn new<T, F>(width: i32, height: i32, init: F) -> Buffer
    where
        T: BufferImpl,
        F: FnOnce(&Buffer) -> T,
    {
        let buffer = Buffer(Rc::new(BufferInner {
            width,
            height,
            dropped: Cell::new(false),
            locks: Cell::new(0),
            destroyed: Cell::new(false),
            release: Signaler::new(),
            destroy: Signaler::new(),
            implementation: RefCell::new(None),
        }));
        let implementation = init(&buffer);
        *buffer.0.implementation.borrow_mut() = Some(Box::new(implementation));
        buffer
    }

    /// Width in pixels
    pub fn width(&self) -> i32 {
        self.0.width
    }

    /// Height in pixels
    pub fn height(&self) -> i32 {
        self.0.height
    }

    /// Take a lock on the buffer, preventing its destruction and signaling the producer
    /// that the contents are in use.
    pub fn lock(&self) -> BufferLock {
        self.0.locks.set(self.0.locks.get() + 1);
        BufferLock { buffer: self.clone() }
    }

    /// Number of locks currently held
    pub fn locks(&self) -> usize {
        self.0.locks.get()
    }

    /// Give up the producer reference.
    ///
    /// The buffer is destroyed right away if no locks are held, otherwise as soon as the
    /// last lock is released. Calling this more than once has no effect.
    pub fn drop_buffer(&self) {
        if self.0.dropped.replace(true) {
            warn!("Buffer has already been dropped");
            return;
        }
        self.consider_destroy();
    }

    /// Whether the producer reference was given up
    pub fn is_dropped(&self) -> bool {
        self.0.dropped.get()
    }

    /// Register a callback for the `release` signal, sent whenever the last lock is released.
    pub fn on_release<F: FnMut() + 'static>(&self, mut f: F) -> SignalToken {
        self.0.release.register(move |_| f())
    }

    /// Register a callback for the `destroy` signal, sent right before the buffer is destroyed.
    pub fn on_destroy<F: FnMut() + 'static>(&self, mut f: F) -> SignalToken {
        self.0.destroy.register(move |_| f())
    }

    /// Describe the buffer as dmabuf, if its implementation supports that.
    pub fn dmabuf(&self) -> Option<DmabufAttributes> {
        let implementation = self.0.implementation.borrow();
        implementation.as_ref()?.dmabuf(self)
    }

    /// Access the implementation of this buffer, if it is of type `T` and the buffer is still alive.
    pub fn downcast_impl<T: BufferImpl>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.0.implementation.borrow(), |implementation| {
            implementation
                .as_deref()
                .and_then(|implementation| implementation.downcast_ref::<T>())
        })
        .ok()
    }

    /// Create a weak reference to this buffer
    pub fn downgrade(&self) -> WeakBuffer {
        WeakBuffer(Rc::downgrade(&self.0))
    }

    fn unlock(&self) {
        let locks = self.0.locks.get();
        debug_assert!(locks > 0);
        self.0.locks.set(locks.saturating_sub(1));
        if locks == 1 {
            trace!("Buffer released");
            self.0.release.signal(());
        }
        self.consider_destroy();
    }

    fn consider_destroy(&self) {
        if !self.0.dropped.get() || self.0.locks.get() > 0 || self.0.destroyed.get() {
            return;
        }
        self.0.destroyed.set(true);
        trace!(width = self.0.width, height = self.0.height, "Destroying buffer");
        self.0.destroy.signal(());
        // drop outside of the borrow, the implementation may access the buffer while tearing down
        let implementation = self.0.implementation.borrow_mut().take();
        drop(implementation);
    }
}

impl IsAlive for Buffer {
    #[inline]
    fn alive(&self) -> bool {
        !self.0.destroyed.get()
    }
}

impl WeakBuffer {
    /// Try to get a strong handle, fails if every handle was dropped
    pub fn upgrade(&self) -> Option<Buffer> {
        self.0.upgrade().map(Buffer)
    }
}

/// A lock on a [`Buffer`], released when dropped
#[derive(Debug)]
pub struct BufferLock {
    buffer: Buffer,
}

impl BufferLock {
    /// The locked buffer
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

impl Drop for BufferLock {
    fn drop(&mut self) {
        self.buffer.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestBuffer {
        destroyed: Rc<Cell<bool>>,
    }

    impl BufferImpl for TestBuffer {}

    impl Drop for TestBuffer {
        fn drop(&mut self) {
            self.destroyed.set(true);
        }
    }

    fn test_buffer() -> (Buffer, Rc<Cell<bool>>) {
        let destroyed = Rc::new(Cell::new(false));
        let buffer = Buffer::new(16, 8, |_| TestBuffer {
            destroyed: destroyed.clone(),
        });
        (buffer, destroyed)
    }

    #[test]
    fn drop_without_locks_destroys() {
        let (buffer, destroyed) = test_buffer();
        assert!(buffer.alive());
        assert!(buffer.downcast_impl::<TestBuffer>().is_some());

        buffer.drop_buffer();
        assert!(destroyed.get());
        assert!(!buffer.alive());
        assert!(buffer.downcast_impl::<TestBuffer>().is_none());
        assert!(buffer.dmabuf().is_none());
    }

    #[test]
    fn locks_delay_destruction() {
        let (buffer, destroyed) = test_buffer();
        let released = Rc::new(Cell::new(0));
        let _token = buffer.on_release({
            let released = released.clone();
            move || released.set(released.get() + 1)
        });

        let first = buffer.lock();
        let second = buffer.lock();
        buffer.drop_buffer();
        assert!(!destroyed.get());

        drop(first);
        assert_eq!(released.get(), 0);
        drop(second);
        assert_eq!(released.get(), 1);
        assert!(destroyed.get());
    }

    #[test]
    fn release_without_drop_keeps_buffer() {
        let (buffer, destroyed) = test_buffer();
        let released = Rc::new(Cell::new(0));
        let _token = buffer.on_release({
            let released = released.clone();
            move || released.set(released.get() + 1)
        });

        drop(buffer.lock());
        drop(buffer.lock());
        assert_eq!(released.get(), 2);
        assert!(!destroyed.get());
        assert_eq!(buffer.locks(), 0);
    }

    #[test]
    fn destroy_signal_precedes_destruction() {
        let (buffer, destroyed) = test_buffer();
        let seen_alive = Rc::new(Cell::new(None));
        let _token = buffer.on_destroy({
            let destroyed = destroyed.clone();
            let seen_alive = seen_alive.clone();
            move || seen_alive.set(Some(!destroyed.get()))
        });

        buffer.drop_buffer();
        assert_eq!(seen_alive.get(), Some(true));
        assert!(destroyed.get());
    }

    #[test]
    fn double_drop_is_ignored() {
        let (buffer, destroyed) = test_buffer();
        let lock = buffer.lock();
        buffer.drop_buffer();
        buffer.drop_buffer();
        assert!(buffer.is_dropped());
        assert!(!destroyed.get());
        drop(lock);
        assert!(destroyed.get());
    }

    #[test]
    fn handles_compare_by_identity() {
        let (a, _) = test_buffer();
        let (b, _) = test_buffer();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downgrade().upgrade(), Some(a.clone()));
    }
}
