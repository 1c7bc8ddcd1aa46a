//! Various utilities functions and types

pub mod signaling;

/// Trait that is implemented on objects whose lifetime is tied to something outside of Rust's
/// ownership, like a client resource or a reference-counted buffer.
pub trait IsAlive {
    /// Check if object is alive
    fn alive(&self) -> bool;
}

impl<T: IsAlive> IsAlive for &T {
    #[inline]
    fn alive(&self) -> bool {
        IsAlive::alive(*self)
    }
}
