//! In-memory EGL display for tests

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use super::{ffi, EGLError, EGLWaylandDisplay, Extensions};

pub(crate) fn wl_display_ptr(id: usize) -> *mut ffi::wl_display {
    id as *mut ffi::wl_display
}

pub(crate) fn wl_resource_ptr(id: usize) -> *mut ffi::wl_resource {
    id as *mut ffi::wl_resource
}

/// Properties of an EGL buffer known to the mock: texture format, width, height
pub(crate) type MockBufferInfo = (ffi::EGLint, ffi::EGLint, ffi::EGLint);

/// Display answering buffer queries from a table keyed by resource pointer.
///
/// Pointers are only compared, never dereferenced.
#[derive(Debug)]
pub(crate) struct MockDisplay {
    extensions: Extensions,
    fail_bind: bool,
    buffers: Rc<RefCell<HashMap<usize, MockBufferInfo>>>,
    calls: Rc<RefCell<Vec<&'static str>>>,
}

impl MockDisplay {
    pub(crate) fn new(extensions: Extensions) -> MockDisplay {
        MockDisplay {
            extensions,
            fail_bind: false,
            buffers: Rc::new(RefCell::new(HashMap::new())),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub(crate) fn failing_bind(mut self) -> MockDisplay {
        self.fail_bind = true;
        self
    }

    /// Log of the entry points called so far
    pub(crate) fn calls(&self) -> Rc<RefCell<Vec<&'static str>>> {
        self.calls.clone()
    }

    /// Table of buffers EGL claims to know
    pub(crate) fn buffers(&self) -> Rc<RefCell<HashMap<usize, MockBufferInfo>>> {
        self.buffers.clone()
    }
}

impl EGLWaylandDisplay for MockDisplay {
    fn extensions(&self) -> Extensions {
        self.extensions
    }

    fn bind_wayland_display(&self, _display: *mut ffi::wl_display) -> Result<(), EGLError> {
        self.calls.borrow_mut().push("bind");
        if self.fail_bind {
            Err(EGLError::BadAccess)
        } else {
            Ok(())
        }
    }

    fn unbind_wayland_display(&self, _display: *mut ffi::wl_display) -> Result<(), EGLError> {
        self.calls.borrow_mut().push("unbind");
        Ok(())
    }

    fn query_wayland_buffer(
        &self,
        buffer: *mut ffi::wl_resource,
        attribute: ffi::EGLint,
    ) -> Result<ffi::EGLint, EGLError> {
        self.calls.borrow_mut().push("query");
        let buffers = self.buffers.borrow();
        let (format, width, height) = buffers.get(&(buffer as usize)).ok_or(EGLError::BadParameter)?;
        match attribute as ffi::EGLenum {
            ffi::TEXTURE_FORMAT => Ok(*format),
            ffi::WIDTH => Ok(*width),
            ffi::HEIGHT => Ok(*height),
            _ => Err(EGLError::BadAttribute),
        }
    }
}
