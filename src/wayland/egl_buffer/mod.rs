//! EGL based `wl_buffer`s
//!
//! Clients rendering through EGL submit buffers created by the EGL implementation of the
//! compositor (see [`EGLContext::bind_wl_display`]). This module adapts them to the generic
//! [`Buffer`] abstraction.
//!
//! ## How to use it
//!
//! Create an [`EglBufferState`] and register it, together with your [`EGLContext`], in the
//! [`BufferResourceRegistry`] of your compositor. The context is only referenced weakly: once it is
//! dropped the adapter stops recognizing buffers.
//!
//! ```no_run
//! # use std::rc::Rc;
//! # use smithay_egl_buffer::backend::egl::EGLContext;
//! # use smithay_egl_buffer::wayland::buffer::resource::{BufferResourceRegistry, ClientBuffer};
//! use smithay_egl_buffer::wayland::egl_buffer::EglBufferState;
//!
//! # fn setup<R: ClientBuffer>(context: &Rc<EGLContext>, registry: &mut BufferResourceRegistry<R>) -> EglBufferState<R> {
//! let state = EglBufferState::new();
//! state.register(registry, context);
//! # state
//! # }
//! ```
//!
//! Imported buffers mirror their client resource: whenever the last lock on the [`Buffer`] is
//! released, the client receives a `wl_buffer.release` event. A destroy listener is attached to
//! every imported resource, once it fires the producer reference of the [`Buffer`] is dropped and
//! no further events are sent to the client. [`EglBufferState::resource_destroyed`] does the same
//! for compositors that want to forget a resource early.

use std::{
    cell::{Cell, Ref, RefCell},
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use tracing::{debug, error, instrument, trace};

use crate::{
    backend::{
        allocator::dmabuf::DmabufAttributes,
        egl::{ffi, EGLContext, EGLError, Format},
    },
    utils::{signaling::SignalToken, IsAlive},
    wayland::buffer::{
        resource::{BufferResourceInterface, BufferResourceRegistry, ClientBuffer, DestroyListener},
        Buffer, BufferImpl,
    },
};

mod vendor;
pub use self::vendor::{MaliBufferSharingInfo, SharingInfoError};

#[cfg(feature = "use_system_lib")]
mod wl;


/// Name the adapter is registered under in a [`BufferResourceRegistry`]
pub const EGL_BUFFER_INTERFACE_NAME: &str = "egl_buffer";

/// Error that can occur when importing an EGL buffer
#[derive(Debug, thiserror::Error)]
pub enum BufferImportError {
    /// No context is registered, it is gone, or it does not support EGL buffers
    #[error("EGL buffers are unsupported by the current context")]
    Unsupported,
    /// The resource is not a buffer managed by EGL
    #[error("This buffer is not managed by EGL. Err: {0:}")]
    NotManaged(#[source] EGLError),
    /// EGL reported a texture format without a known single-plane representation
    #[error("Invalid or unsupported EGL buffer format {0:#x}")]
    UnsupportedFormat(ffi::EGLint),
}

/// Link between an imported buffer and its client resource.
///
/// Holds the resource until the runtime announces its destruction, after which it is `None`.
#[derive(Debug)]
struct ResourceLink<R> {
    resource: RefCell<Option<R>>,
}

impl<R: ClientBuffer> ResourceLink<R> {
    fn resource(&self) -> Option<R> {
        self.resource.borrow().clone()
    }

    fn is_attached(&self) -> bool {
        self.resource.borrow().is_some()
    }

    fn detach(&self) -> Option<R> {
        self.resource.borrow_mut().take()
    }

    fn send_release(&self) {
        match &*self.resource.borrow() {
            Some(resource) => {
                trace!(?resource, "Releasing EGL buffer");
                resource.send_release();
            }
            None => trace!("EGL buffer released after its resource was destroyed"),
        }
    }
}

#[derive(Debug)]
struct TrackedBuffer<R> {
    buffer: Buffer,
    link: Rc<ResourceLink<R>>,
}

type BufferTable<R> = RefCell<HashMap<<R as ClientBuffer>::Id, TrackedBuffer<R>>>;

fn forget_resource<R: ClientBuffer>(tracked: TrackedBuffer<R>) {
    if let Some(resource) = tracked.link.detach() {
        debug!(?resource, "EGL buffer resource destroyed");
    }
    tracked.buffer.drop_buffer();
}

// `link` identifies the import the listener was attached for, the resource may have been
// forgotten and imported again since.
fn resource_destroy_notify<R: ClientBuffer>(
    buffers: &Weak<BufferTable<R>>,
    id: &R::Id,
    link: &Weak<ResourceLink<R>>,
) {
    let (Some(buffers), Some(link)) = (buffers.upgrade(), link.upgrade()) else {
        return;
    };
    let tracked = {
        let mut buffers = buffers.borrow_mut();
        let current = buffers
            .get(id)
            .is_some_and(|tracked| Rc::ptr_eq(&tracked.link, &link));
        if current {
            buffers.remove(id)
        } else {
            None
        }
    };
    if let Some(tracked) = tracked {
        forget_resource(tracked);
    }
}

struct EglBufferStateInner<R: ClientBuffer> {
    context: RefCell<Weak<EGLContext>>,
    vendor_dmabuf_export: Cell<bool>,
    buffers: Rc<BufferTable<R>>,
}

/// Registration of the EGL buffer adapter
///
/// This is a cheap handle, clones refer to the same state.
pub struct EglBufferState<R: ClientBuffer> {
    inner: Rc<EglBufferStateInner<R>>,
}

impl<R: ClientBuffer> Clone for EglBufferState<R> {
    fn clone(&self) -> Self {
        EglBufferState {
            inner: self.inner.clone(),
        }
    }
}

impl<R: ClientBuffer> fmt::Debug for EglBufferState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EglBufferState")
            .field("context", &self.inner.context.borrow().upgrade())
            .field("vendor_dmabuf_export", &self.inner.vendor_dmabuf_export.get())
            .field("buffers", &self.inner.buffers.borrow().len())
            .finish()
    }
}

impl<R: ClientBuffer> Default for EglBufferState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ClientBuffer> EglBufferState<R> {
    /// Create a new adapter state without a context
    pub fn new() -> EglBufferState<R> {
        EglBufferState {
            inner: Rc::new(EglBufferStateInner {
                context: RefCell::new(Weak::new()),
                vendor_dmabuf_export: Cell::new(false),
                buffers: Rc::new(RefCell::new(HashMap::new())),
            }),
        }
    }

    /// Make `context` the active EGL context and install the adapter into `registry`.
    ///
    /// Calling this again replaces the active context, the registry keeps a single entry.
    pub fn register(&self, registry: &mut BufferResourceRegistry<R>, context: &Rc<EGLContext>) {
        *self.inner.context.borrow_mut() = Rc::downgrade(context);
        registry.register(Rc::new(self.clone()));
        debug!(
            supported = context.supports_wl_buffers(),
            "Registered EGL buffer interface"
        );
    }

    /// Enable or disable exporting dmabufs through the `mali_buffer_sharing` user data
    /// of client resources.
    ///
    /// The layout of that data is not documented anywhere, it is guessed and cross-checked
    /// against the buffer before being trusted (see [`MaliBufferSharingInfo`]).
    /// Disabled by default, applies to buffers imported afterwards.
    pub fn set_vendor_dmabuf_export(&self, enabled: bool) {
        self.inner.vendor_dmabuf_export.set(enabled);
    }

    /// Whether vendor dmabuf export is enabled for new buffers
    pub fn vendor_dmabuf_export(&self) -> bool {
        self.inner.vendor_dmabuf_export.get()
    }

    /// The active context, if it is still alive and supports EGL buffers
    pub fn context(&self) -> Option<Rc<EGLContext>> {
        self.inner
            .context
            .borrow()
            .upgrade()
            .filter(|context| context.supports_wl_buffers())
    }

    /// Whether `resource` is an EGL based buffer.
    ///
    /// Without an active context this is always `false` and the resource is not touched.
    pub fn is_egl_buffer(&self, resource: &R) -> bool {
        let Some(context) = self.context() else {
            return false;
        };
        match context.query_wayland_buffer(resource.as_ptr(), ffi::TEXTURE_FORMAT as ffi::EGLint) {
            Ok(_) => true,
            Err(err) => {
                trace!(?resource, ?err, "Not an EGL buffer");
                false
            }
        }
    }

    /// Get the [`Buffer`] for an EGL based `wl_buffer`.
    ///
    /// The same [`Buffer`] is returned for a resource until the resource is destroyed.
    #[instrument(level = "debug", skip_all, fields(id = ?resource.id()))]
    pub fn import(&self, resource: &R) -> Result<Buffer, BufferImportError> {
        let context = self.context().ok_or(BufferImportError::Unsupported)?;

        if let Some(tracked) = self.inner.buffers.borrow().get(&resource.id()) {
            return Ok(tracked.buffer.clone());
        }

        let ptr = resource.as_ptr();
        let query = |attribute: ffi::EGLenum| {
            context
                .query_wayland_buffer(ptr, attribute as ffi::EGLint)
                .map_err(BufferImportError::NotManaged)
        };
        let format = query(ffi::TEXTURE_FORMAT)?;
        let width = query(ffi::WIDTH)?;
        let height = query(ffi::HEIGHT)?;

        let has_alpha = match Format::try_from(format) {
            Ok(Format::RGB) => Some(false),
            Ok(Format::RGBA) | Ok(Format::External) => Some(true),
            _ => None,
        };

        let link = Rc::new(ResourceLink {
            resource: RefCell::new(Some(resource.clone())),
        });
        let buffer = Buffer::new(width, height, |buffer| {
            let release = buffer.on_release({
                let link = link.clone();
                move || link.send_release()
            });
            let destroy = resource.add_destroy_listener(Box::new({
                let buffers = Rc::downgrade(&self.inner.buffers);
                let id = resource.id();
                let link = Rc::downgrade(&link);
                move || resource_destroy_notify(&buffers, &id, &link)
            }));
            EglBuffer {
                context: Rc::downgrade(&context),
                has_alpha: has_alpha.unwrap_or(false),
                vendor_dmabuf_export: self.vendor_dmabuf_export(),
                id: resource.id(),
                link: link.clone(),
                buffers: Rc::downgrade(&self.inner.buffers),
                _release: release,
                _destroy: destroy,
            }
        });
        self.inner.buffers.borrow_mut().insert(
            resource.id(),
            TrackedBuffer {
                buffer: buffer.clone(),
                link,
            },
        );

        if has_alpha.is_none() {
            error!(?format, "Invalid or unsupported EGL buffer format");
            buffer.drop_buffer();
            return Err(BufferImportError::UnsupportedFormat(format));
        }

        debug!(width, height, ?has_alpha, "Imported EGL buffer");
        Ok(buffer)
    }

    /// Forget the client resource, as if it was destroyed.
    ///
    /// This happens on its own once the resource is destroyed. The [`Buffer`] loses its producer
    /// reference and is destroyed as soon as no locks are held anymore, and no events are sent to
    /// the resource from then on. Calling this for resources that are not tracked does nothing.
    pub fn resource_destroyed(&self, resource: &R) {
        let Some(tracked) = self.inner.buffers.borrow_mut().remove(&resource.id()) else {
            return;
        };
        forget_resource(tracked);
    }

    /// Number of buffers currently tracked for live client resources
    pub fn tracked_buffers(&self) -> usize {
        self.inner.buffers.borrow().len()
    }
}

impl<R: ClientBuffer> BufferResourceInterface<R> for EglBufferState<R> {
    fn name(&self) -> &'static str {
        EGL_BUFFER_INTERFACE_NAME
    }

    fn is_instance(&self, resource: &R) -> bool {
        self.is_egl_buffer(resource)
    }

    fn from_resource(&self, resource: &R) -> Option<Buffer> {
        self.import(resource).ok()
    }
}

/// A [`Buffer`] backed by an EGL based `wl_buffer`
pub struct EglBuffer<R: ClientBuffer> {
    context: Weak<EGLContext>,
    has_alpha: bool,
    vendor_dmabuf_export: bool,
    id: R::Id,
    link: Rc<ResourceLink<R>>,
    buffers: Weak<BufferTable<R>>,
    _release: SignalToken,
    _destroy: DestroyListener,
}

impl<R: ClientBuffer> fmt::Debug for EglBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EglBuffer")
            .field("has_alpha", &self.has_alpha)
            .field("vendor_dmabuf_export", &self.vendor_dmabuf_export)
            .field("resource", &self.link.resource())
            .finish_non_exhaustive()
    }
}

impl<R: ClientBuffer> EglBuffer<R> {
    /// Whether the contents carry an alpha channel
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// The client resource, `None` once it was destroyed
    pub fn resource(&self) -> Option<R> {
        self.link.resource()
    }

    /// The EGL context the buffer was imported with, if still alive
    pub fn context(&self) -> Option<Rc<EGLContext>> {
        self.context.upgrade()
    }
}

impl<R: ClientBuffer> BufferImpl for EglBuffer<R> {
    fn dmabuf(&self, buffer: &Buffer) -> Option<DmabufAttributes> {
        if !self.vendor_dmabuf_export {
            return None;
        }
        let resource = self.link.resource()?;
        match unsafe { MaliBufferSharingInfo::from_user_data(resource.user_data()) }
            .and_then(|info| info.dmabuf_attributes(buffer.width(), buffer.height()))
        {
            Ok(attributes) => Some(attributes),
            Err(err) => {
                trace!(?resource, ?err, "No dmabuf for EGL buffer");
                None
            }
        }
    }
}

impl<R: ClientBuffer> IsAlive for EglBuffer<R> {
    fn alive(&self) -> bool {
        self.link.is_attached()
    }
}

impl<R: ClientBuffer> Drop for EglBuffer<R> {
    fn drop(&mut self) {
        // still attached means the destruction was not triggered by the resource
        if self.link.detach().is_some() {
            if let Some(buffers) = self.buffers.upgrade() {
                buffers.borrow_mut().remove(&self.id);
            }
        }
    }
}

/// Access the [`EglBuffer`] behind a [`Buffer`], if it is one
pub fn egl_buffer<R: ClientBuffer>(buffer: &Buffer) -> Option<Ref<'_, EglBuffer<R>>> {
    buffer.downcast_impl::<EglBuffer<R>>()
}
