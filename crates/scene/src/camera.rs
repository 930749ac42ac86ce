use vesta_math::{MathError, Matrix4, Vector3};

/// Closed set of projection kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// `fov` is the vertical field of view in radians.
    Perspective {
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self) -> Matrix4 {
        match *self {
            Self::Perspective {
                fov,
                aspect,
                near,
                far,
            } => Matrix4::perspective(fov, aspect, near, far),
            Self::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => Matrix4::orthographic(left, right, top, bottom, near, far),
        }
    }
}

/// A projection plus a view (world-to-camera) matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Projection,
    projection_matrix: Matrix4,
    view: Matrix4,
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            projection_matrix: projection.matrix(),
            view: Matrix4::IDENTITY,
        }
    }

    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Perspective {
            fov,
            aspect,
            near,
            far,
        })
    }

    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Orthographic {
            left,
            right,
            top,
            bottom,
            near,
            far,
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn projection_matrix(&self) -> &Matrix4 {
        &self.projection_matrix
    }

    pub fn view_matrix(&self) -> &Matrix4 {
        &self.view
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_matrix = projection.matrix();
    }

    /// Update the aspect ratio of a perspective camera. Orthographic cameras
    /// keep their explicit bounds.
    pub fn set_aspect(&mut self, new_aspect: f32) {
        if let Projection::Perspective { fov, near, far, .. } = self.projection {
            self.set_projection(Projection::Perspective {
                fov,
                aspect: new_aspect,
                near,
                far,
            });
        }
    }

    pub fn set_view(&mut self, view: Matrix4) {
        self.view = view;
    }

    pub fn look_at(&mut self, eye: &Vector3, target: &Vector3, up: &Vector3) {
        self.view = Matrix4::look_at(eye, target, up);
    }

    /// Place the camera with a camera-to-world transform, such as a node's
    /// world matrix.
    pub fn set_view_from_world(&mut self, world: &Matrix4) -> Result<(), MathError> {
        self.view = world.try_inverse()?;
        Ok(())
    }
}
