//! EGL context related structs

use std::{cell::Cell, fmt, ptr::NonNull};

use tracing::{debug, warn};

use super::{ffi, EGLError, EGLWaylandDisplay, Error, Extensions};

/// Wrapper around an initialized EGL display and its wayland related entry points.
///
/// Besides forwarding buffer queries it remembers the `wl_display` bound through
/// [`EGLContext::bind_wl_display`] and unbinds it again when dropped.
pub struct EGLContext {
    display: Box<dyn EGLWaylandDisplay>,
    extensions: Extensions,
    wl_display: Cell<Option<NonNull<ffi::wl_display>>>,
}

impl fmt::Debug for EGLContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EGLContext")
            .field("display", &self.display)
            .field("extensions", &self.extensions)
            .field("wl_display", &self.wl_display.get())
            .finish()
    }
}

impl EGLContext {
    /// Wrap an EGL display
    pub fn new<D: EGLWaylandDisplay + 'static>(display: D) -> EGLContext {
        let extensions = display.extensions();
        debug!(?extensions, "Created EGL context");
        EGLContext {
            display: Box::new(display),
            extensions,
            wl_display: Cell::new(None),
        }
    }

    /// Extensions of the underlying display
    pub fn extensions(&self) -> Extensions {
        self.extensions
    }

    /// Whether the display supports `EGL_WL_bind_wayland_display`, and thus EGL based `wl_buffer`s.
    pub fn supports_wl_buffers(&self) -> bool {
        self.extensions.contains(Extensions::WL_BIND_WAYLAND_DISPLAY)
    }

    /// The `wl_display` currently bound to this context, if any
    pub fn wl_display(&self) -> Option<*mut ffi::wl_display> {
        self.wl_display.get().map(NonNull::as_ptr)
    }

    /// Binds this EGL display to the given wayland display.
    ///
    /// This will allow clients to utilize EGL to create hardware-accelerated
    /// surfaces. The server will need to be able to handle EGL-`wl_buffer`s.
    ///
    /// If the display does not support `EGL_WL_bind_wayland_display` this does nothing and
    /// succeeds, EGL buffers are then simply never offered to clients. Binding the display
    /// that is already bound is a no-op as well.
    ///
    /// ## Errors
    ///
    /// This might return [`OtherEGLDisplayAlreadyBound`](Error::OtherEGLDisplayAlreadyBound)
    /// if the EGL implementation refuses the binding, e.g. because another display is already
    /// bound to the given `wl_display`.
    pub fn bind_wl_display(&self, wl_display: *mut ffi::wl_display) -> Result<(), Error> {
        if !self.supports_wl_buffers() {
            debug!("EGL_WL_bind_wayland_display unsupported, not binding wl_display");
            return Ok(());
        }
        if self.wl_display() == Some(wl_display) {
            return Ok(());
        }

        self.display
            .bind_wayland_display(wl_display)
            .map_err(Error::OtherEGLDisplayAlreadyBound)?;
        debug!(?wl_display, "Bound wl_display to EGL display");
        self.wl_display.set(NonNull::new(wl_display));
        Ok(())
    }

    /// Unbinds the currently bound wayland display.
    pub fn unbind_wl_display(&self) -> Result<(), Error> {
        let bound = self.wl_display.take().ok_or(Error::NoEGLDisplayBound)?;
        if let Err(err) = self.display.unbind_wayland_display(bound.as_ptr()) {
            self.wl_display.set(Some(bound));
            return Err(Error::UnbindFailed(err));
        }
        let wl_display = bound.as_ptr();
        debug!(?wl_display, "Unbound wl_display from EGL display");
        Ok(())
    }

    /// Query an attribute of an EGL based `wl_buffer`.
    ///
    /// Fails with [`EGLError::BadParameter`] for buffers not managed by EGL.
    pub fn query_wayland_buffer(
        &self,
        buffer: *mut ffi::wl_resource,
        attribute: ffi::EGLint,
    ) -> Result<ffi::EGLint, EGLError> {
        self.display.query_wayland_buffer(buffer, attribute)
    }
}

impl Drop for EGLContext {
    fn drop(&mut self) {
        if self.wl_display.get().is_some() {
            if let Err(err) = self.unbind_wl_display() {
                warn!(?err, "Failed to unbind wl_display");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::egl::test_utils::{wl_display_ptr, MockDisplay};

    #[test]
    fn bind_without_extension_is_noop() {
        let display = MockDisplay::new(Extensions::empty());
        let calls = display.calls();
        let context = EGLContext::new(display);

        assert!(context.bind_wl_display(wl_display_ptr(1)).is_ok());
        assert_eq!(context.wl_display(), None);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn bind_records_display() {
        let display = MockDisplay::new(Extensions::WL_BIND_WAYLAND_DISPLAY);
        let calls = display.calls();
        let context = EGLContext::new(display);

        context.bind_wl_display(wl_display_ptr(1)).unwrap();
        assert_eq!(context.wl_display(), Some(wl_display_ptr(1)));

        // binding the same display again does not reach EGL
        context.bind_wl_display(wl_display_ptr(1)).unwrap();
        assert_eq!(*calls.borrow(), vec!["bind"]);

        drop(context);
        assert_eq!(*calls.borrow(), vec!["bind", "unbind"]);
    }

    #[test]
    fn bind_failure_keeps_previous_state() {
        let display = MockDisplay::new(Extensions::WL_BIND_WAYLAND_DISPLAY).failing_bind();
        let context = EGLContext::new(display);

        assert!(matches!(
            context.bind_wl_display(wl_display_ptr(2)),
            Err(Error::OtherEGLDisplayAlreadyBound(EGLError::BadAccess))
        ));
        assert_eq!(context.wl_display(), None);
    }

    #[test]
    fn unbind_without_binding() {
        let context = EGLContext::new(MockDisplay::new(Extensions::WL_BIND_WAYLAND_DISPLAY));
        assert!(matches!(context.unbind_wl_display(), Err(Error::NoEGLDisplayBound)));
    }
}
