//! Reexports of crates, that are part of the public api, for convenience

pub use drm_fourcc;
pub use rustix;
#[cfg(feature = "use_system_lib")]
pub use wayland_server;
