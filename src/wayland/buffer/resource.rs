//! Adapters turning client resources into [`Buffer`]s
//!
//! Clients submit buffers as opaque protocol objects whose contents may be stored in many
//! ways. Each way is handled by a [`BufferResourceInterface`], which can tell whether it is
//! responsible for a given resource and import it. The compositor keeps all of them in a
//! [`BufferResourceRegistry`] and asks it for a [`Buffer`] whenever a client attaches a resource.

use std::{ffi::c_void, fmt, hash::Hash, rc::Rc};

use tracing::trace;

use super::Buffer;
use crate::backend::egl::ffi;

/// A buffer resource submitted by a client.
///
/// The resource is owned by the display-server runtime; implementors are cheap handles to it
/// which never keep it alive.
pub trait ClientBuffer: Clone + fmt::Debug + 'static {
    /// Identity of the resource, stable for as long as the resource lives
    type Id: Clone + Eq + Hash + fmt::Debug + 'static;

    /// Identity of the resource
    fn id(&self) -> Self::Id;

    /// Pointer to the underlying `wl_resource`, as understood by EGL
    fn as_ptr(&self) -> *mut ffi::wl_resource;

    /// Send the `release` event, telling the client it may reuse the buffer
    fn send_release(&self);

    /// Call `notify` once the resource is destroyed.
    ///
    /// `notify` runs at most once. Dropping the returned [`DestroyListener`] before the resource is
    /// destroyed detaches it again.
    fn add_destroy_listener(&self, notify: Box<dyn FnOnce()>) -> DestroyListener;

    /// Pointer to the user data libwayland stores for the resource, null if there is none.
    ///
    /// For resources created by the EGL implementation this points to data private to that
    /// implementation.
    fn user_data(&self) -> *mut c_void {
        std::ptr::null_mut()
    }
}

/// A destroy listener attached to a [`ClientBuffer`], detached when dropped
pub struct DestroyListener {
    detach: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for DestroyListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyListener")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

impl DestroyListener {
    /// Create a listener handle running `detach` when dropped.
    ///
    /// `detach` has to cope with the listener having fired already.
    pub fn new<F: FnOnce() + 'static>(detach: F) -> DestroyListener {
        DestroyListener {
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle with nothing to detach
    pub fn detached() -> DestroyListener {
        DestroyListener { detach: None }
    }
}

impl Drop for DestroyListener {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// An adapter able to import a specific kind of client buffer
pub trait BufferResourceInterface<R: ClientBuffer>: fmt::Debug {
    /// Unique name of the adapter
    fn name(&self) -> &'static str;

    /// Whether the resource is a buffer of the kind this adapter handles.
    ///
    /// This must not alter the resource in any way.
    fn is_instance(&self, resource: &R) -> bool;

    /// Get a [`Buffer`] for the resource, `None` if it cannot be imported.
    fn from_resource(&self, resource: &R) -> Option<Buffer>;
}

/// Registry of [`BufferResourceInterface`]s
pub struct BufferResourceRegistry<R: ClientBuffer> {
    interfaces: Vec<Rc<dyn BufferResourceInterface<R>>>,
}

impl<R: ClientBuffer> fmt::Debug for BufferResourceRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferResourceRegistry")
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<R: ClientBuffer> Default for BufferResourceRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ClientBuffer> BufferResourceRegistry<R> {
    /// Create an empty registry
    pub fn new() -> BufferResourceRegistry<R> {
        BufferResourceRegistry { interfaces: Vec::new() }
    }

    /// Register an adapter.
    ///
    /// An adapter registered before under the same name is replaced, keeping its position.
    pub fn register(&mut self, interface: Rc<dyn BufferResourceInterface<R>>) {
        match self.interfaces.iter_mut().find(|i| i.name() == interface.name()) {
            Some(existing) => {
                trace!(name = interface.name(), "Replacing buffer resource interface");
                *existing = interface;
            }
            None => {
                trace!(name = interface.name(), "Registering buffer resource interface");
                self.interfaces.push(interface);
            }
        }
    }

    /// Remove the adapter with the given name, returning it
    pub fn unregister(&mut self, name: &str) -> Option<Rc<dyn BufferResourceInterface<R>>> {
        let idx = self.interfaces.iter().position(|i| i.name() == name)?;
        Some(self.interfaces.remove(idx))
    }

    /// Names of all registered adapters in the order they are asked
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.interfaces.iter().map(|i| i.name())
    }

    /// Find the adapter responsible for the resource
    pub fn interface_for(&self, resource: &R) -> Option<&Rc<dyn BufferResourceInterface<R>>> {
        self.interfaces.iter().find(|i| i.is_instance(resource))
    }

    /// Import the resource through the first adapter claiming it
    pub fn from_resource(&self, resource: &R) -> Option<Buffer> {
        let Some(interface) = self.interface_for(resource) else {
            trace!(?resource, "No buffer resource interface for resource");
            return None;
        };
        interface.from_resource(resource)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::wayland::buffer::BufferImpl;

    #[derive(Debug, Clone)]
    struct Resource(usize);

    impl ClientBuffer for Resource {
        type Id = usize;

        fn id(&self) -> usize {
            self.0
        }

        fn as_ptr(&self) -> *mut ffi::wl_resource {
            self.0 as *mut _
        }

        fn send_release(&self) {}

        fn add_destroy_listener(&self, _notify: Box<dyn FnOnce()>) -> DestroyListener {
            DestroyListener::detached()
        }
    }

    #[derive(Debug)]
    struct Plain;
    impl BufferImpl for Plain {}

    #[derive(Debug)]
    struct Parity {
        name: &'static str,
        even: bool,
        imports: Cell<usize>,
    }

    impl BufferResourceInterface<Resource> for Parity {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_instance(&self, resource: &Resource) -> bool {
            (resource.0 % 2 == 0) == self.even
        }

        fn from_resource(&self, resource: &Resource) -> Option<Buffer> {
            self.imports.set(self.imports.get() + 1);
            Some(Buffer::new(resource.0 as i32, 1, |_| Plain))
        }
    }

    fn parity(name: &'static str, even: bool) -> Rc<Parity> {
        Rc::new(Parity {
            name,
            even,
            imports: Cell::new(0),
        })
    }

    #[test]
    fn dispatches_to_matching_interface() {
        let mut registry = BufferResourceRegistry::<Resource>::new();
        let even = parity("even", true);
        let odd = parity("odd", false);
        registry.register(even.clone());
        registry.register(odd.clone());

        let buffer = registry.from_resource(&Resource(3)).unwrap();
        assert_eq!(buffer.width(), 3);
        assert_eq!(odd.imports.get(), 1);
        assert_eq!(even.imports.get(), 0);
    }

    #[test]
    fn same_name_replaces() {
        let mut registry = BufferResourceRegistry::<Resource>::new();
        registry.register(parity("parity", true));
        registry.register(parity("other", true));
        registry.register(parity("parity", false));

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["parity", "other"]);
        assert!(registry.interface_for(&Resource(1)).is_some());
        assert_eq!(
            registry.interface_for(&Resource(2)).map(|i| i.name()),
            Some("other")
        );
    }

    #[test]
    fn destroy_listener_detaches_on_drop() {
        let detached = Rc::new(Cell::new(0));
        let listener = DestroyListener::new({
            let detached = detached.clone();
            move || detached.set(detached.get() + 1)
        });
        assert_eq!(detached.get(), 0);
        drop(listener);
        assert_eq!(detached.get(), 1);

        drop(DestroyListener::detached());
    }

    #[test]
    fn unknown_resource() {
        let mut registry = BufferResourceRegistry::<Resource>::new();
        registry.register(parity("even", true));
        assert!(registry.from_resource(&Resource(5)).is_none());

        assert!(registry.unregister("even").is_some());
        assert!(registry.unregister("even").is_none());
        assert!(registry.from_resource(&Resource(4)).is_none());
    }
}
