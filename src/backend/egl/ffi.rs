#![allow(missing_docs, non_camel_case_types, non_upper_case_globals)]

//! EGL types and enum values used by `EGL_WL_bind_wayland_display`

pub type EGLint = i32;
pub type EGLenum = u32;
pub type EGLBoolean = u32;

/// Opaque `struct wl_display` of libwayland-server
#[derive(Debug)]
pub enum wl_display {}
/// Opaque `struct wl_resource` of libwayland-server
#[derive(Debug)]
pub enum wl_resource {}

pub const FALSE: EGLBoolean = 0;
pub const TRUE: EGLBoolean = 1;

pub const SUCCESS: EGLenum = 0x3000;
pub const NOT_INITIALIZED: EGLenum = 0x3001;
pub const BAD_ACCESS: EGLenum = 0x3002;
pub const BAD_ALLOC: EGLenum = 0x3003;
pub const BAD_ATTRIBUTE: EGLenum = 0x3004;
pub const BAD_DISPLAY: EGLenum = 0x3008;
pub const BAD_PARAMETER: EGLenum = 0x300C;

pub const HEIGHT: EGLenum = 0x3056;
pub const WIDTH: EGLenum = 0x3057;
pub const TEXTURE_RGB: EGLenum = 0x305D;
pub const TEXTURE_RGBA: EGLenum = 0x305E;
pub const TEXTURE_FORMAT: EGLenum = 0x3080;

pub const TEXTURE_Y_U_V_WL: EGLint = 0x31D7;
pub const TEXTURE_Y_UV_WL: EGLint = 0x31D8;
pub const TEXTURE_Y_XUXV_WL: EGLint = 0x31D9;
pub const TEXTURE_EXTERNAL_WL: EGLint = 0x31DA;
