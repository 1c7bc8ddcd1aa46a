//! Buffer description types.
//!
//! Collection of common types around buffers shared with other parts of the graphics stack.
//!
//! Buffer types described:
//! - [DmabufAttributes](dmabuf::DmabufAttributes)

pub mod dmabuf;

pub use drm_fourcc::{
    DrmFormat as Format, DrmFourcc as Fourcc, DrmModifier as Modifier, DrmVendor as Vendor,
    UnrecognizedFourcc, UnrecognizedVendor,
};
