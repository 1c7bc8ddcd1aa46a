//! Dmabuf export through the `mali_buffer_sharing` user data
//!
//! Some vendor EGL implementations attach a description of the underlying dmabuf to the
//! `wl_buffer` resources they create. There is no documented layout for it, the one used here
//! is guessed. Everything read from it is therefore validated against the buffer and the file
//! descriptor before being used, and the layout is confined to [`MaliBufferSharingInfo`].
//!
//! On top of the size and stride checks the pixel format has to be a fourcc known to
//! [`drm_fourcc`], as [`DmabufAttributes`] only carries typed formats. Unknown codes make the
//! export fail with [`SharingInfoError::UnknownFourcc`] instead of being passed through.

#![forbid(unsafe_op_in_unsafe_fn)]

use std::{
    ffi::{c_int, c_void},
    os::unix::io::BorrowedFd,
};

use crate::backend::allocator::{dmabuf::DmabufAttributes, Fourcc};

/// Guessed layout of the user data attached by the `mali_buffer_sharing` extension.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaliBufferSharingInfo {
    /// File descriptor of the dmabuf
    pub fd: c_int,
    /// Width in pixels
    pub width: c_int,
    /// Height in pixels
    pub height: c_int,
    /// Stride in bytes
    pub stride: c_int,
    /// DRM fourcc code of the pixel format
    pub fourcc: u32,
}

/// Reasons the sharing info of a resource cannot be trusted
#[derive(Debug, thiserror::Error)]
pub enum SharingInfoError {
    /// The resource carries no user data
    #[error("The resource carries no sharing info")]
    Missing,
    /// The file descriptor is negative
    #[error("Invalid file descriptor {0}")]
    InvalidFd(c_int),
    /// The file descriptor cannot be inspected
    #[error("Failed to stat the shared file descriptor")]
    Stat(#[source] rustix::io::Errno),
    /// The file is too small to hold `width * height` bytes
    #[error("Shared file of {size} bytes is too small for {width}x{height}")]
    FileTooSmall {
        /// Size of the file
        size: i64,
        /// Width of the buffer
        width: i32,
        /// Height of the buffer
        height: i32,
    },
    /// The described size differs from the buffer
    #[error("Shared size {got:?} does not match the buffer size {expected:?}")]
    SizeMismatch {
        /// Size of the buffer
        expected: (i32, i32),
        /// Size described by the sharing info
        got: (c_int, c_int),
    },
    /// The stride is smaller than the width
    #[error("Stride {stride} is smaller than the width {width}")]
    InvalidStride {
        /// Described stride
        stride: c_int,
        /// Width of the buffer
        width: i32,
    },
    /// The pixel format code is not a known fourcc
    #[error("Unknown fourcc {0:#x}")]
    UnknownFourcc(u32),
}

impl MaliBufferSharingInfo {
    /// Read the sharing info from the user data pointer of a resource.
    ///
    /// # Safety
    ///
    /// `user_data` must be null or point to readable memory of at least the size of this struct.
    pub unsafe fn from_user_data(user_data: *const c_void) -> Result<MaliBufferSharingInfo, SharingInfoError> {
        if user_data.is_null() {
            return Err(SharingInfoError::Missing);
        }
        Ok(unsafe { user_data.cast::<MaliBufferSharingInfo>().read_unaligned() })
    }

    /// Describe the shared buffer as a single plane dmabuf of the given size.
    ///
    /// Fails unless the file behind `fd` holds at least `width * height` bytes, the described size
    /// matches, the stride covers at least the width and the fourcc is known. The returned
    /// attributes borrow `fd`.
    pub fn dmabuf_attributes(&self, width: i32, height: i32) -> Result<DmabufAttributes, SharingInfoError> {
        if self.fd < 0 {
            return Err(SharingInfoError::InvalidFd(self.fd));
        }
        let fd = unsafe { BorrowedFd::borrow_raw(self.fd) };
        let stat = rustix::fs::fstat(fd).map_err(SharingInfoError::Stat)?;
        let size = stat.st_size as i64;
        if size < i64::from(width) * i64::from(height) {
            return Err(SharingInfoError::FileTooSmall { size, width, height });
        }
        if self.width != width || self.height != height {
            return Err(SharingInfoError::SizeMismatch {
                expected: (width, height),
                got: (self.width, self.height),
            });
        }
        if self.stride < width || self.stride < 0 {
            return Err(SharingInfoError::InvalidStride {
                stride: self.stride,
                width,
            });
        }
        let format = Fourcc::try_from(self.fourcc).map_err(|_| SharingInfoError::UnknownFourcc(self.fourcc))?;

        Ok(DmabufAttributes::single_plane(
            width,
            height,
            format,
            self.fd,
            self.stride as u32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::io::AsRawFd;

    use super::*;
    use crate::backend::allocator::{dmabuf::DmabufPlane, Modifier};

    fn info(fd: c_int) -> MaliBufferSharingInfo {
        MaliBufferSharingInfo {
            fd,
            width: 100,
            height: 100,
            stride: 100,
            fourcc: Fourcc::Argb8888 as u32,
        }
    }

    fn file_of_size(size: u64) -> std::fs::File {
        let file = tempfile::tempfile().unwrap();
        file.set_len(size).unwrap();
        file
    }

    #[test]
    fn file_too_small() {
        let file = file_of_size(9999);
        let err = info(file.as_raw_fd()).dmabuf_attributes(100, 100).unwrap_err();
        assert!(matches!(err, SharingInfoError::FileTooSmall { size: 9999, .. }));
    }

    #[test]
    fn valid_info() {
        let file = file_of_size(10000);
        let attribs = info(file.as_raw_fd()).dmabuf_attributes(100, 100).unwrap();

        assert_eq!(attribs.width, 100);
        assert_eq!(attribs.height, 100);
        assert_eq!(attribs.format, Fourcc::Argb8888);
        assert_eq!(attribs.modifier, Modifier::Invalid);
        assert_eq!(
            attribs.planes.as_slice(),
            &[DmabufPlane {
                fd: file.as_raw_fd(),
                offset: 0,
                stride: 100
            }]
        );
    }

    #[test]
    fn mismatching_fields() {
        let file = file_of_size(40000);
        let fd = file.as_raw_fd();

        let wide = MaliBufferSharingInfo { width: 101, ..info(fd) };
        assert!(matches!(
            wide.dmabuf_attributes(100, 100),
            Err(SharingInfoError::SizeMismatch { .. })
        ));

        let narrow = MaliBufferSharingInfo { stride: 99, ..info(fd) };
        assert!(matches!(
            narrow.dmabuf_attributes(100, 100),
            Err(SharingInfoError::InvalidStride { stride: 99, .. })
        ));

        let unknown = MaliBufferSharingInfo {
            fourcc: 0xdead_beef,
            ..info(fd)
        };
        assert!(matches!(
            unknown.dmabuf_attributes(100, 100),
            Err(SharingInfoError::UnknownFourcc(0xdead_beef))
        ));
    }

    #[test]
    fn invalid_fd() {
        assert!(matches!(
            info(-1).dmabuf_attributes(100, 100),
            Err(SharingInfoError::InvalidFd(-1))
        ));
    }

    #[test]
    fn read_from_user_data() {
        assert!(matches!(
            unsafe { MaliBufferSharingInfo::from_user_data(std::ptr::null()) },
            Err(SharingInfoError::Missing)
        ));

        let data = info(3);
        let read = unsafe { MaliBufferSharingInfo::from_user_data(&data as *const _ as *const c_void) }.unwrap();
        assert_eq!(read, data);
    }
}
