//! Backend helpers
//!
//! Collection of the graphics-stack side of EGL buffer handling:
//!
//! - [`egl`] wraps an initialized EGL display exposing `EGL_WL_bind_wayland_display`
//! - [`allocator`] describes buffers shared through dmabufs

pub mod allocator;
pub mod egl;
