//! Math utilities and types
//!
//! Provides the handful of nalgebra aliases the culling code works with.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Largest axis scale of an affine transform.
///
/// Used to grow bounding radii when a sphere is moved into world space,
/// so non-uniform scale never shrinks a bound below its true extent.
pub fn max_axis_scale(matrix: &Mat4) -> f32 {
    let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
    let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
    let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
    scale_x.max(scale_y).max(scale_z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_max_axis_scale_identity() {
        assert_relative_eq!(max_axis_scale(&Mat4::identity()), 1.0);
    }

    #[test]
    fn test_max_axis_scale_non_uniform() {
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 0.5, 3.0))
            * Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(max_axis_scale(&matrix), 3.0);
    }
}
