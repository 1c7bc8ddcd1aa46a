#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
// Allow acronyms like EGL
#![allow(clippy::upper_case_acronyms)]

//! # EGL buffers for Smithay-style compositors
//!
//! This crate lets a compositor consume client `wl_buffer`s that were created through
//! `EGL_WL_bind_wayland_display` via a renderer-agnostic, reference-counted [`Buffer`](wayland::buffer::Buffer).
//!
//! ## Structure of the crate
//!
//! - [`backend`] contains the EGL side: the [`EGLContext`](backend::egl::EGLContext) wrapper around
//!   an initialized EGL display exposing the wayland extension entry points, and the dmabuf
//!   description types of the [`allocator`](backend::allocator) module.
//! - [`wayland`] contains the compositor side: the generic [`Buffer`](wayland::buffer::Buffer) object,
//!   the registry of buffer resource adapters and the [`egl_buffer`](wayland::egl_buffer) adapter itself.
//!
//! ## General principles
//!
//! ### The event loop and state handling
//!
//! Like the rest of a wayland compositor everything in here runs on the single thread dispatching
//! the display. Objects are therefore shared through [`Rc`](std::rc::Rc) and notifications are
//! delivered synchronously through [`Signaler`](utils::signaling::Signaler)s, in the order they
//! are emitted.
//!
//! There is no hidden global state: the adapter registration is an explicit
//! [`EglBufferState`](wayland::egl_buffer::EglBufferState) value owned by the compositor, which
//! forwards client buffer destruction to it.
//!
//! ### Logging
//!
//! This crate makes use of [`tracing`] for its internal logging.
//!
//! For release builds it is recommended to limit the log level during compile time.
//! This can be done by adding a dependency to [`tracing`] and enabling the corresponding features.
//! For example to enable `trace` messages for debug builds, but limit release builds to `debug` add
//! the following in your binary crate `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```

pub mod backend;
pub mod utils;
pub mod wayland;

pub mod reexports;
