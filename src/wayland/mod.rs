//! Protocol-related utilities
//!
//! This module contains the compositor side of client buffer handling:
//!
//! - [`buffer`] provides the renderer-agnostic [`Buffer`](buffer::Buffer) object and the registry
//!   deciding which adapter turns a client resource into one.
//! - [`egl_buffer`] adapts `wl_buffer`s created by the EGL implementation of a client.

pub mod buffer;
pub mod egl_buffer;
