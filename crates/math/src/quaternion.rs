use crate::{EPSILON, Matrix4, Vector3};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Rotation quaternion `(x, y, z, w)`, `w` being the scalar part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::IDENTITY
    }

    #[inline]
    pub const fn from_array(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Rotation of `angle` radians around `axis`, which must be normalized.
    pub fn from_axis_angle(axis: &Vector3, angle: f32) -> Self {
        let (sin, cos) = (angle * 0.5).sin_cos();
        Self::new(axis.x * sin, axis.y * sin, axis.z * sin, cos)
    }

    /// Rotation part of `m`.
    ///
    /// Precondition: the upper 3x3 of `m` is a pure rotation (no scale, no
    /// shear). Other inputs give an unspecified quaternion; strip scale first
    /// (see [`Matrix4::decompose`]).
    pub fn from_rotation_matrix(m: &Matrix4) -> Self {
        let e = m.elements();
        Self::from_rotation_elements([
            [e[0], e[4], e[8]],
            [e[1], e[5], e[9]],
            [e[2], e[6], e[10]],
        ])
    }

    /// Shepperd's method over a row-major 3x3 rotation.
    pub(crate) fn from_rotation_elements(r: [[f32; 3]; 3]) -> Self {
        let [[m11, m12, m13], [m21, m22, m23], [m31, m32, m33]] = r;
        let trace = m11 + m22 + m33;

        if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            Self::new((m32 - m23) * s, (m13 - m31) * s, (m21 - m12) * s, 0.25 / s)
        } else if m11 > m22 && m11 > m33 {
            let s = 2.0 * (1.0 + m11 - m22 - m33).sqrt();
            Self::new(0.25 * s, (m12 + m21) / s, (m13 + m31) / s, (m32 - m23) / s)
        } else if m22 > m33 {
            let s = 2.0 * (1.0 + m22 - m11 - m33).sqrt();
            Self::new((m12 + m21) / s, 0.25 * s, (m23 + m32) / s, (m13 - m31) / s)
        } else {
            let s = 2.0 * (1.0 + m33 - m11 - m22).sqrt();
            Self::new((m13 + m31) / s, (m23 + m32) / s, 0.25 * s, (m21 - m12) / s)
        }
    }

    /// Shortest rotation taking unit vector `from` onto unit vector `to`.
    pub fn from_unit_vectors(from: &Vector3, to: &Vector3) -> Self {
        let r = from.dot(to) + 1.0;

        let q = if r < EPSILON {
            // Opposite vectors: any axis orthogonal to `from` works.
            if from.x.abs() > from.z.abs() {
                Self::new(-from.y, from.x, 0.0, 0.0)
            } else {
                Self::new(0.0, -from.z, from.y, 0.0)
            }
        } else {
            let c = from.cross(to);
            Self::new(c.x, c.y, c.z, r)
        };

        q.normalize()
    }

    /// Hamilton product `self * other`: applies `other` first, then `self`.
    pub fn multiply(&self, other: &Quaternion) -> Self {
        let (ax, ay, az, aw) = (self.x, self.y, self.z, self.w);
        let (bx, by, bz, bw) = (other.x, other.y, other.z, other.w);

        Self::new(
            ax * bw + aw * bx + ay * bz - az * by,
            ay * bw + aw * by + az * bx - ax * bz,
            az * bw + aw * bz + ax * by - ay * bx,
            aw * bw - ax * bx - ay * by - az * bz,
        )
    }

    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    #[inline]
    pub fn dot(&self, other: &Quaternion) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    #[inline]
    pub fn length_squared(&self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit quaternion. A zero quaternion normalizes to identity.
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let inv = 1.0 / len;
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Angle in radians between the two rotations.
    pub fn angle_to(&self, other: &Quaternion) -> f32 {
        2.0 * self.dot(other).clamp(-1.0, 1.0).abs().acos()
    }

    /// Spherical interpolation along the shorter arc.
    pub fn slerp(&self, other: &Quaternion, t: f32) -> Self {
        if t == 0.0 {
            return *self;
        }
        if t == 1.0 {
            return *other;
        }

        let mut cos_half_theta = self.dot(other);
        let mut other = *other;
        if cos_half_theta < 0.0 {
            other = Self::new(-other.x, -other.y, -other.z, -other.w);
            cos_half_theta = -cos_half_theta;
        }

        let sin_half_theta_sq = 1.0 - cos_half_theta * cos_half_theta;
        if sin_half_theta_sq <= EPSILON {
            let s = 1.0 - t;
            return Self::new(
                s * self.x + t * other.x,
                s * self.y + t * other.y,
                s * self.z + t * other.z,
                s * self.w + t * other.w,
            )
            .normalize();
        }

        let sin_half_theta = sin_half_theta_sq.sqrt();
        let half_theta = sin_half_theta.atan2(cos_half_theta);
        let ratio_a = ((1.0 - t) * half_theta).sin() / sin_half_theta;
        let ratio_b = (t * half_theta).sin() / sin_half_theta;

        Self::new(
            self.x * ratio_a + other.x * ratio_b,
            self.y * ratio_a + other.y * ratio_b,
            self.z * ratio_a + other.z * ratio_b,
            self.w * ratio_a + other.w * ratio_b,
        )
    }

    /// Rotate `v` by this (unit) quaternion.
    pub fn rotate_vector(&self, v: &Vector3) -> Vector3 {
        let u = Vector3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        *v + t * self.w + u.cross(&t)
    }

    pub fn approx_eq(&self, other: &Quaternion, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
            && (self.w - other.w).abs() <= epsilon
    }
}

impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.multiply(&rhs)
    }
}

impl From<glam::Quat> for Quaternion {
    fn from(q: glam::Quat) -> Self {
        Self::new(q.x, q.y, q.z, q.w)
    }
}

impl From<Quaternion> for glam::Quat {
    fn from(q: Quaternion) -> Self {
        glam::Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn zero_angle_is_identity() {
        for axis in [Vector3::RIGHT, Vector3::UP, Vector3::FORWARD] {
            assert_eq!(Quaternion::from_axis_angle(&axis, 0.0), Quaternion::identity());
        }
    }

    #[test]
    fn normalize_gives_unit_length() {
        let samples = [
            Quaternion::new(1.0, 2.0, 3.0, 4.0),
            Quaternion::new(-0.1, 0.0, 0.0, 0.0),
            Quaternion::new(100.0, -50.0, 25.0, 0.5),
        ];
        for q in samples {
            assert!((q.normalize().length() - 1.0).abs() < 1e-6);
        }
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize(), Quaternion::IDENTITY);
    }

    #[test]
    fn slerp_halfway_around_y() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(&Vector3::UP, FRAC_PI_2);
        let mid = a.slerp(&b, 0.5);
        let expected = Quaternion::from_axis_angle(&Vector3::UP, FRAC_PI_4);
        assert!(mid.approx_eq(&expected, 1e-4), "{mid:?} != {expected:?}");
    }

    #[test]
    fn slerp_endpoints_and_near_equal() {
        let a = Quaternion::from_axis_angle(&Vector3::RIGHT, 0.3);
        let b = Quaternion::from_axis_angle(&Vector3::UP, 1.2);
        assert_eq!(a.slerp(&b, 0.0), a);
        assert_eq!(a.slerp(&b, 1.0), b);
        let nearly_a = Quaternion::from_axis_angle(&Vector3::RIGHT, 0.3 + 1e-7);
        assert!(a.slerp(&nearly_a, 0.5).approx_eq(&a, 1e-5));
    }

    #[test]
    fn multiply_composes_rotations() {
        let q = Quaternion::from_axis_angle(&Vector3::UP, FRAC_PI_4);
        let twice = q * q;
        let expected = Quaternion::from_axis_angle(&Vector3::UP, FRAC_PI_2);
        assert!(twice.approx_eq(&expected, 1e-6));
        assert!((q * q.conjugate()).approx_eq(&Quaternion::IDENTITY, 1e-6));
    }

    #[test]
    fn rotation_matrix_round_trip_all_branches() {
        let cases = [
            Quaternion::from_axis_angle(&Vector3::UP, 0.5),
            Quaternion::from_axis_angle(&Vector3::RIGHT, PI * 0.9),
            Quaternion::from_axis_angle(&Vector3::UP, PI * 0.9),
            Quaternion::from_axis_angle(&Vector3::FORWARD, PI * 0.9),
        ];
        for q in cases {
            let m = Matrix4::compose(&Vector3::ZERO, &q, &Vector3::ONE);
            let back = Quaternion::from_rotation_matrix(&m);
            // q and -q are the same rotation.
            let same = back.approx_eq(&q, 1e-5)
                || back.approx_eq(&Quaternion::new(-q.x, -q.y, -q.z, -q.w), 1e-5);
            assert!(same, "{back:?} vs {q:?}");
        }
    }

    #[test]
    fn unit_vectors_rotation() {
        let q = Quaternion::from_unit_vectors(&Vector3::RIGHT, &Vector3::UP);
        assert!(q.rotate_vector(&Vector3::RIGHT).approx_eq(&Vector3::UP, 1e-6));

        let opposite = Quaternion::from_unit_vectors(&Vector3::RIGHT, &-Vector3::RIGHT);
        assert!((opposite.length() - 1.0).abs() < 1e-6);
        assert!(
            opposite
                .rotate_vector(&Vector3::RIGHT)
                .approx_eq(&-Vector3::RIGHT, 1e-5)
        );
    }

    #[test]
    fn angle_between_rotations() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(&Vector3::UP, FRAC_PI_2);
        assert!((a.angle_to(&b) - FRAC_PI_2).abs() < 1e-5);
    }
}
