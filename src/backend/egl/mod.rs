//! Common traits and types for EGL based wayland buffers
//!
//! Clients using EGL hand their buffers to the compositor as `wl_buffer`s whose contents only the
//! EGL implementation of the compositor understands. To make this work the compositor has to bind
//! its EGL display to the wayland display through `EGL_WL_bind_wayland_display`, after which the
//! extension can be queried for properties of such buffers.
//!
//! This module does not load EGL itself. The entry points of the extension are provided by an
//! implementation of [`EGLWaylandDisplay`] for an already initialized EGL display, which is then
//! wrapped in an [`EGLContext`] and handed to the
//! [`egl_buffer`](crate::wayland::egl_buffer) adapter.

use std::fmt;

pub mod context;
pub use self::context::EGLContext;
mod error;
pub use self::error::*;

#[allow(non_camel_case_types, dead_code)]
pub mod ffi;

bitflags::bitflags! {
    /// EGL extensions relevant for wayland buffers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Extensions: u32 {
        /// `EGL_WL_bind_wayland_display`
        const WL_BIND_WAYLAND_DISPLAY = 1;
    }
}

impl Extensions {
    /// Parse the space separated extension string returned by `eglQueryString(display, EGL_EXTENSIONS)`
    pub fn from_extension_string(extensions: &str) -> Extensions {
        let mut flags = Extensions::empty();
        if extensions
            .split_whitespace()
            .any(|ext| ext == "EGL_WL_bind_wayland_display")
        {
            flags |= Extensions::WL_BIND_WAYLAND_DISPLAY;
        }
        flags
    }
}

/// Entry points of `EGL_WL_bind_wayland_display` on an initialized EGL display.
///
/// Implementations wrap the loaded function pointers together with the `EGLDisplay` handle
/// and report failures through the error code set by the call.
pub trait EGLWaylandDisplay: fmt::Debug {
    /// Extensions supported by the display
    fn extensions(&self) -> Extensions;

    /// `eglBindWaylandDisplayWL`
    fn bind_wayland_display(&self, display: *mut ffi::wl_display) -> Result<(), EGLError>;

    /// `eglUnbindWaylandDisplayWL`
    fn unbind_wayland_display(&self, display: *mut ffi::wl_display) -> Result<(), EGLError>;

    /// `eglQueryWaylandBufferWL`, returning the value of `attribute` for the given `wl_buffer` resource.
    ///
    /// This is a pure query, it must not alter the buffer in any way.
    fn query_wayland_buffer(
        &self,
        buffer: *mut ffi::wl_resource,
        attribute: ffi::EGLint,
    ) -> Result<ffi::EGLint, EGLError>;
}

/// Texture format types
#[repr(i32)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// RGB format
    RGB = ffi::TEXTURE_RGB as i32,
    /// RGB + alpha channel format
    RGBA = ffi::TEXTURE_RGBA as i32,
    /// External format
    External = ffi::TEXTURE_EXTERNAL_WL,
    /// 2-plane Y and UV format
    Y_UV = ffi::TEXTURE_Y_UV_WL,
    /// 3-plane Y, U and V format
    Y_U_V = ffi::TEXTURE_Y_U_V_WL,
    /// 2-plane Y and XUXV format
    Y_XUXV = ffi::TEXTURE_Y_XUXV_WL,
}

impl Format {
    /// Amount of planes this format uses
    pub fn num_planes(&self) -> usize {
        match *self {
            Format::RGB | Format::RGBA | Format::External => 1,
            Format::Y_UV | Format::Y_XUXV => 2,
            Format::Y_U_V => 3,
        }
    }
}

/// Value returned for `EGL_TEXTURE_FORMAT` that is not a known texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unknown EGL texture format {0:#x}")]
pub struct UnknownFormat(pub ffi::EGLint);

impl TryFrom<ffi::EGLint> for Format {
    type Error = UnknownFormat;

    fn try_from(value: ffi::EGLint) -> Result<Self, Self::Error> {
        Ok(match value {
            x if x == ffi::TEXTURE_RGB as i32 => Format::RGB,
            x if x == ffi::TEXTURE_RGBA as i32 => Format::RGBA,
            ffi::TEXTURE_EXTERNAL_WL => Format::External,
            ffi::TEXTURE_Y_UV_WL => Format::Y_UV,
            ffi::TEXTURE_Y_U_V_WL => Format::Y_U_V,
            ffi::TEXTURE_Y_XUXV_WL => Format::Y_XUXV,
            x => return Err(UnknownFormat(x)),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_utils;
