//! Camera systems for rendering.
//!
//! Projections follow the OpenGL clip-space convention (z in `[-1, 1]`).
//! A camera may carry a [`ViewOffset`] that narrows its frustum to a
//! sub-rectangle of the full viewport, which is how single-pixel picking
//! renders exactly the pixel under the cursor.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::geometry::Ray;

/// Projection type for the camera.
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    /// Perspective projection, `fov_y` in radians
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

/// Sub-rectangle of a larger viewport the camera renders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewOffset {
    pub full_width: f32,
    pub full_height: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A camera for rendering the scene.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Camera rotation
    pub rotation: Quat,
    /// Projection settings
    pub projection: Projection,
    view_offset: Option<ViewOffset>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(20.0, 1.0, 0.01, 200.0)
    }
}

impl Camera {
    /// Create a perspective camera, `fov_deg` is the vertical field of view.
    pub fn perspective(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: fov_deg.to_radians(),
                aspect,
                near,
                far,
            },
            view_offset: None,
        }
    }

    /// Create an orthographic camera.
    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            },
            view_offset: None,
        }
    }

    /// Vertical field of view in degrees, `None` for orthographic cameras.
    pub fn fov_degrees(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { fov_y, .. } => Some(fov_y.to_degrees()),
            Projection::Orthographic { .. } => None,
        }
    }

    /// Update the aspect ratio (for perspective projection).
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: ref mut a, .. } = self.projection {
            *a = aspect;
        }
    }

    /// Restrict rendering to the `width x height` rectangle at `(x, y)` of a
    /// `full_width x full_height` viewport.
    pub fn set_view_offset(
        &mut self,
        full_width: f32,
        full_height: f32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) {
        self.view_offset = Some(ViewOffset {
            full_width,
            full_height,
            x,
            y,
            width,
            height,
        });
    }

    pub fn clear_view_offset(&mut self) {
        self.view_offset = None;
    }

    pub fn view_offset(&self) -> Option<ViewOffset> {
        self.view_offset
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        let forward = self.rotation * Vec3::NEG_Z;
        let up = self.rotation * Vec3::Y;
        Mat4::look_at_rh(self.position, self.position + forward, up)
    }

    /// Get the projection matrix, honoring the view offset if one is set.
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => {
                let mut top = near * (fov_y * 0.5).tan();
                let mut height = 2.0 * top;
                let mut width = aspect * height;
                let mut left = -0.5 * width;

                if let Some(view) = self.view_offset {
                    left += view.x * width / view.full_width;
                    top -= view.y * height / view.full_height;
                    width *= view.width / view.full_width;
                    height *= view.height / view.full_height;
                }

                frustum(left, left + width, top - height, top, near, far)
            }
            Projection::Orthographic {
                mut left,
                mut right,
                mut top,
                mut bottom,
                near,
                far,
            } => {
                if let Some(view) = self.view_offset {
                    let scale_w = (right - left) / view.full_width;
                    let scale_h = (top - bottom) / view.full_height;
                    left += scale_w * view.x;
                    right = left + scale_w * view.width;
                    top -= scale_h * view.y;
                    bottom = top - scale_h * view.height;
                }
                Mat4::orthographic_rh_gl(left, right, bottom, top, near, far)
            }
        }
    }

    /// Get the view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction vector.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Get the right direction vector.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get the up direction vector.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Look at a target position keeping world up as the up vector.
    pub fn look_at(&mut self, target: Vec3) {
        let forward = target - self.position;
        if forward.length_squared() <= f32::EPSILON {
            return;
        }
        let forward = forward.normalize();
        if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, forward);
            return;
        }
        let view = Mat4::look_at_rh(self.position, target, Vec3::Y);
        self.rotation = Quat::from_mat4(&view.inverse());
    }

    /// World-space ray through a point in normalized device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection_matrix().inverse();
        let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, -1.0));
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Ray::new(near, far - near)
    }
}

/// Off-center perspective frustum, OpenGL clip conventions.
fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let x = 2.0 * near / (right - left);
    let y = 2.0 * near / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = -(far + near) / (far - near);
    let d = -2.0 * far * near / (far - near);

    Mat4::from_cols(
        Vec4::new(x, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y, 0.0, 0.0),
        Vec4::new(a, b, c, -1.0),
        Vec4::new(0.0, 0.0, d, 0.0),
    )
}
