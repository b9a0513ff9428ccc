//! Local transform of a scene node.
//!
//! Hierarchy lives in the [`Scene`](crate::Scene) graph: a [`Transform`] is
//! always relative to the node's parent and world matrices are composed by
//! walking the graph.
//!
//! # Example
//!
//! ```
//! use ripe_scene::Transform;
//! use glam::Vec3;
//!
//! let t = Transform::new()
//!     .with_position(Vec3::new(1.0, 0.0, 0.0))
//!     .with_euler(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
//! let p = t.local_matrix().transform_point3(Vec3::ZERO);
//! assert!((p - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
//! ```

use glam::{EulerRot, Mat4, Quat, Vec3};

/// A transform representing position, rotation, and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Position relative to the parent node
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
    /// Scale factor
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with the given position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Create a transform with the given rotation.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Create a transform rotated by XYZ-ordered Euler angles in radians.
    pub fn with_euler(mut self, euler: Vec3) -> Self {
        self.rotation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
        self
    }

    /// Create a transform with the given scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Decompose an affine matrix (as stored in glTF nodes).
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Rotation expressed as XYZ-ordered Euler angles in radians.
    pub fn euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    /// Get the local transformation matrix.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Get the normal matrix (inverse transpose) for a world matrix.
    ///
    /// If the matrix is not invertible (e.g., contains zero scale),
    /// the identity matrix is returned as a fallback to avoid NaN/Inf values.
    pub fn normal_matrix(world: Mat4) -> Mat4 {
        const EPSILON: f32 = 1e-6;
        let det = world.determinant();

        if det.abs() < EPSILON {
            Mat4::IDENTITY
        } else {
            world.inverse().transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn test_normal_matrix_with_scale() {
        let t = Transform::new().with_scale(Vec3::new(2.0, 1.0, 1.0));
        let normal = Transform::normal_matrix(t.local_matrix());
        assert_eq!(normal, Mat4::from_scale(Vec3::new(0.5, 1.0, 1.0)));
    }

    #[test]
    fn test_normal_matrix_falls_back_for_flat_scale() {
        let t = Transform::new().with_scale(Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(Transform::normal_matrix(t.local_matrix()), Mat4::IDENTITY);
    }

    #[test]
    fn test_euler_round_trip() {
        let euler = Vec3::new(0.1, -0.4, 0.25);
        let t = Transform::new().with_euler(euler);
        let back = t.euler();
        assert_relative_eq!(back.x, euler.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, euler.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, euler.z, epsilon = 1e-5);
    }

    #[test]
    fn test_from_matrix_decomposes_gltf_node() {
        let source = Transform::new()
            .with_position(Vec3::new(10.0, 5.0, 0.0))
            .with_euler(Vec3::new(0.0, 0.5, 0.0))
            .with_scale(Vec3::splat(3.0));
        let t = Transform::from_matrix(source.local_matrix());
        assert!(t.position.abs_diff_eq(source.position, 1e-5));
        assert!(t.scale.abs_diff_eq(source.scale, 1e-5));
        assert!(t.rotation.abs_diff_eq(source.rotation, 1e-5));
    }
}
