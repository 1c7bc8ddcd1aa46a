//! [`ClientBuffer`] for `wl_buffer`s of a libwayland-server backed display

#![forbid(unsafe_op_in_unsafe_fn)]

use std::{cell::Cell, ffi::c_void, ptr, rc::Rc};

use tracing::trace;
use wayland_server::{backend::ObjectId, protocol::wl_buffer::WlBuffer, Resource};
use wayland_sys::{common::wl_list, ffi_dispatch, server::*};

use crate::{
    backend::egl::ffi,
    wayland::buffer::resource::{ClientBuffer, DestroyListener},
};

// `listener` has to stay the first field, libwayland only knows about that part.
#[repr(C)]
struct ResourceDestroyListener {
    listener: wl_listener,
    notify: Option<Box<dyn FnOnce()>>,
    attached: Rc<Cell<bool>>,
}

unsafe extern "C" fn resource_destroyed(listener: *mut wl_listener, _data: *mut c_void) {
    // SAFETY: the listener was leaked from a `Box<ResourceDestroyListener>` in
    // `add_destroy_listener`, and is only reclaimed here or when detached while still attached
    let mut listener = unsafe { Box::from_raw(listener as *mut ResourceDestroyListener) };
    unsafe { ffi_dispatch!(wayland_server_handle(), wl_list_remove, &mut listener.listener.link) };
    listener.attached.set(false);
    if let Some(notify) = listener.notify.take() {
        notify();
    }
}

impl ClientBuffer for WlBuffer {
    type Id = ObjectId;

    fn id(&self) -> ObjectId {
        Resource::id(self)
    }

    fn as_ptr(&self) -> *mut ffi::wl_resource {
        Resource::id(self).as_ptr() as *mut ffi::wl_resource
    }

    fn send_release(&self) {
        self.release();
    }

    fn add_destroy_listener(&self, notify: Box<dyn FnOnce()>) -> DestroyListener {
        let resource = Resource::id(self).as_ptr();
        if resource.is_null() {
            trace!(buffer = ?self, "Resource already destroyed, not attaching a destroy listener");
            return DestroyListener::detached();
        }

        let attached = Rc::new(Cell::new(true));
        let listener = Box::into_raw(Box::new(ResourceDestroyListener {
            listener: wl_listener {
                link: wl_list {
                    prev: ptr::null_mut(),
                    next: ptr::null_mut(),
                },
                notify: resource_destroyed,
            },
            notify: Some(notify),
            attached: attached.clone(),
        }));
        unsafe {
            ffi_dispatch!(
                wayland_server_handle(),
                wl_resource_add_destroy_listener,
                resource,
                listener as *mut wl_listener
            )
        };

        DestroyListener::new(move || {
            if attached.get() {
                // SAFETY: still attached, so `resource_destroyed` did not reclaim it
                let mut listener = unsafe { Box::from_raw(listener) };
                unsafe { ffi_dispatch!(wayland_server_handle(), wl_list_remove, &mut listener.listener.link) };
            }
        })
    }

    fn user_data(&self) -> *mut c_void {
        let ptr = Resource::id(self).as_ptr();
        if ptr.is_null() {
            return std::ptr::null_mut();
        }
        unsafe { ffi_dispatch!(wayland_server_handle(), wl_resource_get_user_data, ptr) }
    }
}
