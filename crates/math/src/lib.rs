//! Math primitives: `Vector3`, `Vector4`, `Quaternion`, `Matrix4`.
//!
//! Pure `Copy` value types. Every operation returns a new value; nothing
//! mutates through shared references.
//!
//! # Invariants
//! - `Matrix4` is always fully initialized, column-major.
//! - Normalizing a zero-length vector yields the zero vector.
//! - Inverting a singular matrix is an error, never a silent result
//!   (`Matrix4::inverse_or_zero` exists for callers that want the sentinel).

mod matrix4;
mod quaternion;
mod vector3;
mod vector4;

pub use matrix4::Matrix4;
pub use quaternion::Quaternion;
pub use vector3::Vector3;
pub use vector4::Vector4;

/// Tolerance used by approximate comparisons.
pub const EPSILON: f32 = 1e-6;

/// Errors from fallible math operations.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum MathError {
    #[error("matrix is singular (determinant = {0})")]
    SingularMatrix(f32),
}

/// Convert degrees to radians.
#[inline]
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees.to_radians()
}
