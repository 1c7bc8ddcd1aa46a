use super::ffi;

#[derive(thiserror::Error, Debug)]
/// EGL errors
pub enum Error {
    /// Only one EGLDisplay may be bound to a given `WlDisplay` at any time
    #[error("Only one EGLDisplay may be bound to a given `WlDisplay` at any time")]
    OtherEGLDisplayAlreadyBound(#[source] EGLError),
    /// No EGLDisplay is currently bound to this `WlDisplay`
    #[error("No EGLDisplay is currently bound to this `WlDisplay`")]
    NoEGLDisplayBound,
    /// Unbinding the `WlDisplay` failed
    #[error("Failed to unbind the `WlDisplay` from the EGLDisplay")]
    UnbindFailed(#[source] EGLError),
}

/// Error code reported by the `EGL_WL_bind_wayland_display` entry points
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EGLError {
    /// The EGL display is not initialized
    #[error("The EGL display is not initialized")]
    NotInitialized,
    /// The `wl_display` is already bound, or cannot be bound
    #[error("The wl_display cannot be bound to the EGL display")]
    BadAccess,
    /// Allocating the resources for the call failed
    #[error("EGL failed to allocate resources")]
    BadAlloc,
    /// The queried attribute is not known for `wl_buffer`s
    #[error("Unknown attribute for EGL wl_buffers")]
    BadAttribute,
    /// The EGL display handle is invalid
    #[error("Invalid EGL display")]
    BadDisplay,
    /// The resource is not a `wl_buffer` managed by EGL, or another argument is invalid
    #[error("Invalid argument, e.g. a wl_buffer not managed by EGL")]
    BadParameter,
    /// Any other error code
    #[error("Unexpected EGL error ({0:#x})")]
    Unknown(u32),
}

impl From<u32> for EGLError {
    fn from(value: u32) -> Self {
        match value {
            ffi::NOT_INITIALIZED => EGLError::NotInitialized,
            ffi::BAD_ACCESS => EGLError::BadAccess,
            ffi::BAD_ALLOC => EGLError::BadAlloc,
            ffi::BAD_ATTRIBUTE => EGLError::BadAttribute,
            ffi::BAD_DISPLAY => EGLError::BadDisplay,
            ffi::BAD_PARAMETER => EGLError::BadParameter,
            x => EGLError::Unknown(x),
        }
    }
}

impl EGLError {
    /// Turn the `EGLBoolean` result of an EGL call and the value of `eglGetError` afterwards into a `Result`.
    ///
    /// A failed call that did not set an error code is reported as [`EGLError::BadParameter`].
    pub fn from_call(result: ffi::EGLBoolean, error: u32) -> Result<(), EGLError> {
        match (result, error) {
            (ffi::FALSE, ffi::SUCCESS) => Err(EGLError::BadParameter),
            (_, ffi::SUCCESS) => Ok(()),
            (_, x) => Err(EGLError::from(x)),
        }
    }
}
