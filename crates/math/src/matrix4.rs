use crate::{MathError, Quaternion, Vector3, Vector4};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A 4x4 matrix stored column-major: `elements[col * 4 + row]`.
///
/// This is the layout shaders expect for `uniformMatrix4fv` without
/// transposition, so `elements()` can be uploaded as is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix4 {
    elements: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    #[rustfmt::skip]
    pub const IDENTITY: Self = Self::from_cols_array([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub const ZERO: Self = Self::from_cols_array([0.0; 16]);

    #[inline]
    pub const fn from_cols_array(elements: [f32; 16]) -> Self {
        Self { elements }
    }

    /// Build from rows as written on paper.
    #[rustfmt::skip]
    pub const fn from_rows(r: [[f32; 4]; 4]) -> Self {
        Self::from_cols_array([
            r[0][0], r[1][0], r[2][0], r[3][0],
            r[0][1], r[1][1], r[2][1], r[3][1],
            r[0][2], r[1][2], r[2][2], r[3][2],
            r[0][3], r[1][3], r[2][3], r[3][3],
        ])
    }

    #[inline]
    pub fn identity() -> Self {
        Self::IDENTITY
    }

    #[inline]
    pub const fn elements(&self) -> &[f32; 16] {
        &self.elements
    }

    #[inline]
    pub fn elements_mut(&mut self) -> &mut [f32; 16] {
        &mut self.elements
    }

    pub fn translation(v: &Vector3) -> Self {
        let mut m = Self::IDENTITY;
        m.elements[12] = v.x;
        m.elements[13] = v.y;
        m.elements[14] = v.z;
        m
    }

    pub fn scale(v: &Vector3) -> Self {
        let mut m = Self::IDENTITY;
        m.elements[0] = v.x;
        m.elements[5] = v.y;
        m.elements[10] = v.z;
        m
    }

    /// Rotation of `angle` radians around the normalized `axis`.
    pub fn rotation_axis(axis: &Vector3, angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let Vector3 { x, y, z } = *axis;
        let (tx, ty) = (t * x, t * y);

        Self::from_rows([
            [tx * x + c, tx * y - s * z, tx * z + s * y, 0.0],
            [tx * y + s * z, ty * y + c, ty * z - s * x, 0.0],
            [tx * z - s * y, ty * z + s * x, t * z * z + c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Orthographic projection onto the GL clip cube.
    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        let w = 1.0 / (right - left);
        let h = 1.0 / (top - bottom);
        let p = 1.0 / (far - near);

        Self::from_rows([
            [2.0 * w, 0.0, 0.0, -(right + left) * w],
            [0.0, 2.0 * h, 0.0, -(top + bottom) * h],
            [0.0, 0.0, -2.0 * p, -(far + near) * p],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Right-handed perspective projection; `fov_y` is the vertical field of
    /// view in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let top = near * (fov_y * 0.5).tan();
        let bottom = -top;
        let right = top * aspect;
        let left = -right;
        Self::frustum(left, right, top, bottom, near, far)
    }

    pub fn frustum(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        let x = 2.0 * near / (right - left);
        let y = 2.0 * near / (top - bottom);
        let a = (right + left) / (right - left);
        let b = (top + bottom) / (top - bottom);
        let c = -(far + near) / (far - near);
        let d = -2.0 * far * near / (far - near);

        Self::from_rows([
            [x, 0.0, a, 0.0],
            [0.0, y, b, 0.0],
            [0.0, 0.0, c, d],
            [0.0, 0.0, -1.0, 0.0],
        ])
    }

    /// Right-handed view matrix looking from `eye` towards `target`.
    ///
    /// `eye == target` or `up` parallel to the view direction yields a
    /// degenerate (non-invertible) matrix.
    pub fn look_at(eye: &Vector3, target: &Vector3, up: &Vector3) -> Self {
        let f = (*target - *eye).normalize();
        let s = f.cross(up).normalize();
        let u = s.cross(&f);

        Self::from_rows([
            [s.x, s.y, s.z, -s.dot(eye)],
            [u.x, u.y, u.z, -u.dot(eye)],
            [-f.x, -f.y, -f.z, f.dot(eye)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Translation * rotation * scale, written out directly.
    pub fn compose(position: &Vector3, quaternion: &Quaternion, scale: &Vector3) -> Self {
        let Quaternion { x, y, z, w } = *quaternion;
        let (x2, y2, z2) = (x + x, y + y, z + z);
        let (xx, xy, xz) = (x * x2, x * y2, x * z2);
        let (yy, yz, zz) = (y * y2, y * z2, z * z2);
        let (wx, wy, wz) = (w * x2, w * y2, w * z2);
        let Vector3 { x: sx, y: sy, z: sz } = *scale;

        Self::from_cols_array([
            (1.0 - (yy + zz)) * sx,
            (xy + wz) * sx,
            (xz - wy) * sx,
            0.0,
            (xy - wz) * sy,
            (1.0 - (xx + zz)) * sy,
            (yz + wx) * sy,
            0.0,
            (xz + wy) * sz,
            (yz - wx) * sz,
            (1.0 - (xx + yy)) * sz,
            0.0,
            position.x,
            position.y,
            position.z,
            1.0,
        ])
    }

    /// Split an affine transform into position, rotation and scale.
    ///
    /// A negative determinant is folded into the x scale. Shear is lost.
    pub fn decompose(&self) -> (Vector3, Quaternion, Vector3) {
        let e = &self.elements;
        let mut scale = self.get_scale();
        if self.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let rotation = if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
            Quaternion::IDENTITY
        } else {
            let (ix, iy, iz) = (1.0 / scale.x, 1.0 / scale.y, 1.0 / scale.z);
            Quaternion::from_rotation_elements([
                [e[0] * ix, e[4] * iy, e[8] * iz],
                [e[1] * ix, e[5] * iy, e[9] * iz],
                [e[2] * ix, e[6] * iy, e[10] * iz],
            ])
        };

        (self.get_position(), rotation, scale)
    }

    pub fn get_position(&self) -> Vector3 {
        Vector3::new(self.elements[12], self.elements[13], self.elements[14])
    }

    /// Lengths of the three basis columns.
    pub fn get_scale(&self) -> Vector3 {
        let e = &self.elements;
        Vector3::new(
            Vector3::new(e[0], e[1], e[2]).length(),
            Vector3::new(e[4], e[5], e[6]).length(),
            Vector3::new(e[8], e[9], e[10]).length(),
        )
    }

    /// `self * other`: `other` is applied first.
    pub fn multiply(&self, other: &Matrix4) -> Self {
        let a = &self.elements;
        let b = &other.elements;
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = a[row] * b[col * 4]
                    + a[4 + row] * b[col * 4 + 1]
                    + a[8 + row] * b[col * 4 + 2]
                    + a[12 + row] * b[col * 4 + 3];
            }
        }
        Self::from_cols_array(out)
    }

    pub fn multiply_scalar(&self, s: f32) -> Self {
        let mut out = self.elements;
        for v in &mut out {
            *v *= s;
        }
        Self::from_cols_array(out)
    }

    /// Transform a point, dividing by the resulting w. A zero w skips the
    /// divide.
    pub fn multiply_vector3(&self, v: &Vector3) -> Vector3 {
        let r = self.multiply_vector4(&Vector4::from_point(*v));
        if r.w == 0.0 {
            r.xyz()
        } else {
            r.xyz() * (1.0 / r.w)
        }
    }

    pub fn multiply_vector4(&self, v: &Vector4) -> Vector4 {
        let e = &self.elements;
        Vector4::new(
            e[0] * v.x + e[4] * v.y + e[8] * v.z + e[12] * v.w,
            e[1] * v.x + e[5] * v.y + e[9] * v.z + e[13] * v.w,
            e[2] * v.x + e[6] * v.y + e[10] * v.z + e[14] * v.w,
            e[3] * v.x + e[7] * v.y + e[11] * v.z + e[15] * v.w,
        )
    }

    pub fn transpose(&self) -> Self {
        let e = &self.elements;
        Self::from_rows([
            [e[0], e[1], e[2], e[3]],
            [e[4], e[5], e[6], e[7]],
            [e[8], e[9], e[10], e[11]],
            [e[12], e[13], e[14], e[15]],
        ])
    }

    pub fn determinant(&self) -> f32 {
        let (_, det) = self.cofactors();
        det
    }

    /// First column of the adjugate plus the determinant.
    fn cofactors(&self) -> ([f32; 4], f32) {
        let e = &self.elements;
        let (n11, n21, n31, n41) = (e[0], e[1], e[2], e[3]);
        let (n12, n22, n32, n42) = (e[4], e[5], e[6], e[7]);
        let (n13, n23, n33, n43) = (e[8], e[9], e[10], e[11]);
        let (n14, n24, n34, n44) = (e[12], e[13], e[14], e[15]);

        let t11 = n23 * n34 * n42 - n24 * n33 * n42 + n24 * n32 * n43 - n22 * n34 * n43
            - n23 * n32 * n44
            + n22 * n33 * n44;
        let t12 = n14 * n33 * n42 - n13 * n34 * n42 - n14 * n32 * n43 + n12 * n34 * n43
            + n13 * n32 * n44
            - n12 * n33 * n44;
        let t13 = n13 * n24 * n42 - n14 * n23 * n42 + n14 * n22 * n43 - n12 * n24 * n43
            - n13 * n22 * n44
            + n12 * n23 * n44;
        let t14 = n14 * n23 * n32 - n13 * n24 * n32 - n14 * n22 * n33 + n12 * n24 * n33
            + n13 * n22 * n34
            - n12 * n23 * n34;

        let det = n11 * t11 + n21 * t12 + n31 * t13 + n41 * t14;
        ([t11, t12, t13, t14], det)
    }

    /// Inverse by the adjugate method.
    pub fn try_inverse(&self) -> Result<Self, MathError> {
        let ([t11, t12, t13, t14], det) = self.cofactors();
        if det == 0.0 || !det.is_finite() {
            return Err(MathError::SingularMatrix(det));
        }

        let e = &self.elements;
        let (n11, n21, n31, n41) = (e[0], e[1], e[2], e[3]);
        let (n12, n22, n32, n42) = (e[4], e[5], e[6], e[7]);
        let (n13, n23, n33, n43) = (e[8], e[9], e[10], e[11]);
        let (n14, n24, n34, n44) = (e[12], e[13], e[14], e[15]);
        let inv = 1.0 / det;

        let out = [
            t11 * inv,
            (n24 * n33 * n41 - n23 * n34 * n41 - n24 * n31 * n43 + n21 * n34 * n43
                + n23 * n31 * n44
                - n21 * n33 * n44)
                * inv,
            (n22 * n34 * n41 - n24 * n32 * n41 + n24 * n31 * n42 - n21 * n34 * n42
                - n22 * n31 * n44
                + n21 * n32 * n44)
                * inv,
            (n23 * n32 * n41 - n22 * n33 * n41 - n23 * n31 * n42 + n21 * n33 * n42
                + n22 * n31 * n43
                - n21 * n32 * n43)
                * inv,
            t12 * inv,
            (n13 * n34 * n41 - n14 * n33 * n41 + n14 * n31 * n43 - n11 * n34 * n43
                - n13 * n31 * n44
                + n11 * n33 * n44)
                * inv,
            (n14 * n32 * n41 - n12 * n34 * n41 - n14 * n31 * n42 + n11 * n34 * n42
                + n12 * n31 * n44
                - n11 * n32 * n44)
                * inv,
            (n12 * n33 * n41 - n13 * n32 * n41 + n13 * n31 * n42 - n11 * n33 * n42
                - n12 * n31 * n43
                + n11 * n32 * n43)
                * inv,
            t13 * inv,
            (n14 * n23 * n41 - n13 * n24 * n41 - n14 * n21 * n43 + n11 * n24 * n43
                + n13 * n21 * n44
                - n11 * n23 * n44)
                * inv,
            (n12 * n24 * n41 - n14 * n22 * n41 + n14 * n21 * n42 - n11 * n24 * n42
                - n12 * n21 * n44
                + n11 * n22 * n44)
                * inv,
            (n13 * n22 * n41 - n12 * n23 * n41 - n13 * n21 * n42 + n11 * n23 * n42
                + n12 * n21 * n43
                - n11 * n22 * n43)
                * inv,
            t14 * inv,
            (n13 * n24 * n31 - n14 * n23 * n31 + n14 * n21 * n33 - n11 * n24 * n33
                - n13 * n21 * n34
                + n11 * n23 * n34)
                * inv,
            (n14 * n22 * n31 - n12 * n24 * n31 - n14 * n21 * n32 + n11 * n24 * n32
                + n12 * n21 * n34
                - n11 * n22 * n34)
                * inv,
            (n12 * n23 * n31 - n13 * n22 * n31 + n13 * n21 * n32 - n11 * n23 * n32
                - n12 * n21 * n33
                + n11 * n22 * n33)
                * inv,
        ];

        Ok(Self::from_cols_array(out))
    }

    /// Inverse, or [`Matrix4::ZERO`] when the matrix is singular.
    pub fn inverse_or_zero(&self) -> Self {
        self.try_inverse().unwrap_or(Self::ZERO)
    }

    pub fn approx_eq(&self, other: &Matrix4, epsilon: f32) -> bool {
        self.elements
            .iter()
            .zip(other.elements.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Matrix4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.multiply(&rhs)
    }
}

impl Mul<Vector4> for Matrix4 {
    type Output = Vector4;

    fn mul(self, rhs: Vector4) -> Vector4 {
        self.multiply_vector4(&rhs)
    }
}

impl Mul<Vector3> for Matrix4 {
    type Output = Vector3;

    fn mul(self, rhs: Vector3) -> Vector3 {
        self.multiply_vector3(&rhs)
    }
}

impl From<glam::Mat4> for Matrix4 {
    fn from(m: glam::Mat4) -> Self {
        Self::from_cols_array(m.to_cols_array())
    }
}

impl From<Matrix4> for glam::Mat4 {
    fn from(m: Matrix4) -> Self {
        glam::Mat4::from_cols_array(&m.elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn sample_matrices() -> Vec<Matrix4> {
        vec![
            Matrix4::IDENTITY,
            Matrix4::translation(&Vector3::new(1.0, -2.0, 3.0)),
            Matrix4::rotation_axis(&Vector3::new(1.0, 1.0, 0.0).normalize(), 0.7),
            Matrix4::perspective(1.0, 1.5, 0.1, 100.0),
            Matrix4::from_cols_array(std::array::from_fn(|i| i as f32 * 0.5 - 3.0)),
        ]
    }

    #[test]
    fn identity_is_neutral() {
        for m in sample_matrices() {
            assert_eq!(m.multiply(&Matrix4::identity()), m);
            assert_eq!(Matrix4::identity().multiply(&m), m);
        }
    }

    #[test]
    fn singular_inverse() {
        let singular = Matrix4::scale(&Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(singular.determinant(), 0.0);
        assert_eq!(singular.inverse_or_zero(), Matrix4::ZERO);
        assert!(matches!(
            singular.try_inverse(),
            Err(MathError::SingularMatrix(_))
        ));
    }

    #[test]
    fn inverse_matches_glam() {
        let m = Matrix4::compose(
            &Vector3::new(3.0, -1.0, 2.0),
            &Quaternion::from_axis_angle(&Vector3::new(0.0, 0.6, 0.8), 1.1),
            &Vector3::new(2.0, 0.5, 1.5),
        );
        let ours = m.try_inverse().unwrap();
        let oracle = Matrix4::from(glam::Mat4::from(m).inverse());
        assert!(ours.approx_eq(&oracle, 1e-5), "{ours:?}\n{oracle:?}");
        assert!(m.multiply(&ours).approx_eq(&Matrix4::IDENTITY, 1e-5));
    }

    #[test]
    fn compose_matches_glam() {
        let position = Vector3::new(1.0, 2.0, 3.0);
        let rotation = Quaternion::from_axis_angle(&Vector3::UP, 0.4);
        let scale = Vector3::new(2.0, 3.0, 4.0);
        let ours = Matrix4::compose(&position, &rotation, &scale);
        let oracle = glam::Mat4::from_scale_rotation_translation(
            scale.into(),
            rotation.into(),
            position.into(),
        );
        assert!(ours.approx_eq(&oracle.into(), 1e-6));
    }

    #[test]
    fn decompose_round_trip() {
        let position = Vector3::new(-4.0, 0.5, 9.0);
        let rotation = Quaternion::from_axis_angle(&Vector3::new(0.0, 0.0, 1.0), 2.5);
        let scale = Vector3::new(1.0, 2.0, 0.5);
        let (p, r, s) = Matrix4::compose(&position, &rotation, &scale).decompose();
        assert!(p.approx_eq(&position, 1e-6));
        assert!(r.approx_eq(&rotation, 1e-5));
        assert!(s.approx_eq(&scale, 1e-5));
    }

    #[test]
    fn rotation_axis_matches_quaternion() {
        let axis = Vector3::new(1.0, 2.0, 3.0).normalize();
        let from_axis = Matrix4::rotation_axis(&axis, 0.9);
        let from_quat = Matrix4::compose(
            &Vector3::ZERO,
            &Quaternion::from_axis_angle(&axis, 0.9),
            &Vector3::ONE,
        );
        assert!(from_axis.approx_eq(&from_quat, 1e-6));
    }

    #[test]
    fn projections_match_glam() {
        let ours = Matrix4::perspective(FRAC_PI_2, 16.0 / 9.0, 0.1, 50.0);
        let oracle = glam::Mat4::perspective_rh_gl(FRAC_PI_2, 16.0 / 9.0, 0.1, 50.0);
        assert!(ours.approx_eq(&oracle.into(), 1e-5));

        let ours = Matrix4::orthographic(-2.0, 2.0, 1.0, -1.0, 0.1, 10.0);
        let oracle = glam::Mat4::orthographic_rh_gl(-2.0, 2.0, -1.0, 1.0, 0.1, 10.0);
        assert!(ours.approx_eq(&oracle.into(), 1e-6));

        let eye = Vector3::new(0.0, 2.0, 5.0);
        let ours = Matrix4::look_at(&eye, &Vector3::ZERO, &Vector3::UP);
        let oracle = glam::Mat4::look_at_rh(eye.into(), glam::Vec3::ZERO, glam::Vec3::Y);
        assert!(ours.approx_eq(&oracle.into(), 1e-6));
    }

    #[test]
    fn vector_transform() {
        let m = Matrix4::translation(&Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(m * Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(
            m * Vector4::from_direction(Vector3::UP),
            Vector4::new(0.0, 1.0, 0.0, 0.0)
        );
        assert_eq!(m.multiply_scalar(2.0).elements()[15], 2.0);
    }
}
