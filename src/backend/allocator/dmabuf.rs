//! Description of [dmabuf](https://01.org/linuxgraphics/gfx-docs/drm/driver-api/dma-buf.html) buffers.
//!
//! Unlike an owned dmabuf handle, [`DmabufAttributes`] only *describes* a buffer: the file
//! descriptors of its planes are borrowed from whoever exported them and stay valid only as long as
//! that exporter keeps them open. Consumers that need to keep the buffer around have to
//! duplicate the descriptors (see [`DmabufPlane::dup_fd`]).

#![forbid(unsafe_op_in_unsafe_fn)]

use std::os::unix::io::{BorrowedFd, OwnedFd, RawFd};

use smallvec::SmallVec;

use super::{Format, Fourcc, Modifier};

/// Maximum amount of planes this implementation supports
pub const MAX_PLANES: usize = 4;

/// A single plane of a dmabuf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmabufPlane {
    /// File descriptor of the plane, not owned
    pub fd: RawFd,
    /// Offset from the start of the fd
    pub offset: u32,
    /// Stride for this plane
    pub stride: u32,
}

impl DmabufPlane {
    /// Duplicate the file descriptor of this plane to get a durable reference to it.
    ///
    /// # Safety
    ///
    /// `fd` must still be open, i.e. the exporter of these attributes must not have closed it yet.
    pub unsafe fn dup_fd(&self) -> rustix::io::Result<OwnedFd> {
        let fd = unsafe { BorrowedFd::borrow_raw(self.fd) };
        rustix::io::fcntl_dupfd_cloexec(fd, 0)
    }
}

/// Attributes of a buffer exported as dmabuf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmabufAttributes {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Pixel format of the buffer
    pub format: Fourcc,
    /// Modifier shared by all planes
    pub modifier: Modifier,
    /// The planes making up the buffer
    pub planes: SmallVec<[DmabufPlane; MAX_PLANES]>,
}

impl DmabufAttributes {
    /// Attributes of a buffer made of one plane starting at offset zero, without an explicit modifier.
    pub fn single_plane(width: i32, height: i32, format: Fourcc, fd: RawFd, stride: u32) -> DmabufAttributes {
        let mut planes = SmallVec::new();
        planes.push(DmabufPlane { fd, offset: 0, stride });
        DmabufAttributes {
            width,
            height,
            format,
            modifier: Modifier::Invalid,
            planes,
        }
    }

    /// Format and modifier of the buffer
    pub fn drm_format(&self) -> Format {
        Format {
            code: self.format,
            modifier: self.modifier,
        }
    }

    /// Number of planes
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }
}
