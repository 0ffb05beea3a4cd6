//! Rotation matrix storage form and its Euler-angle editing form.
//!
//! Both directions use the same convention, `R = Rz(z) * Ry(y) * Rx(x)`, so a
//! matrix decoded into angles rebuilds the same matrix away from gimbal lock.

use crate::types::EulerAngles;
use approx::RelativeEq;
use nalgebra as na;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(na::Matrix3<f64>);

impl RotationMatrix {
    /// Row-major input, as stored in `R_cam`.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        let [r0, r1, r2] = rows;
        Self(na::Matrix3::new(
            r0[0], r0[1], r0[2], //
            r1[0], r1[1], r1[2], //
            r2[0], r2[1], r2[2],
        ))
    }

    /// Columns are the box's local axes expressed in the reference frame.
    pub fn from_columns(
        x: na::Vector3<f64>,
        y: na::Vector3<f64>,
        z: na::Vector3<f64>,
    ) -> Self {
        Self(na::Matrix3::from_columns(&[x, y, z]))
    }

    pub fn from_euler(angles: EulerAngles) -> Self {
        let rotation = na::Rotation3::from_euler_angles(angles.x, angles.y, angles.z);
        Self(rotation.into_inner())
    }

    pub fn from_quaternion(quaternion: &na::UnitQuaternion<f64>) -> Self {
        Self(quaternion.to_rotation_matrix().into_inner())
    }

    /// Closed-form extraction. Near `y = ±π/2` the split between `x` and `z`
    /// is whatever `atan2` returns.
    pub fn to_euler(&self) -> EulerAngles {
        let r = &self.0;
        EulerAngles {
            x: r[(2, 1)].atan2(r[(2, 2)]),
            y: (-r[(2, 0)]).atan2((r[(2, 1)].powi(2) + r[(2, 2)].powi(2)).sqrt()),
            z: r[(1, 0)].atan2(r[(0, 0)]),
        }
    }

    pub fn to_quaternion(&self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_rotation_matrix(&na::Rotation3::from_matrix_unchecked(self.0))
    }

    pub fn row(&self, index: usize) -> [f64; 3] {
        let r = &self.0;
        [r[(index, 0)], r[(index, 1)], r[(index, 2)]]
    }

    pub fn column(&self, index: usize) -> na::Vector3<f64> {
        self.0.column(index).into_owned()
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        [self.row(0), self.row(1), self.row(2)]
    }

    pub fn matrix(&self) -> &na::Matrix3<f64> {
        &self.0
    }

    /// Unit columns, mutually perpendicular.
    pub fn is_orthonormal(&self, epsilon: f64) -> bool {
        (self.0.transpose() * self.0).relative_eq(&na::Matrix3::identity(), epsilon, epsilon)
    }

    /// Orthonormal and right-handed; reflections fail.
    pub fn is_rotation(&self, epsilon: f64) -> bool {
        self.is_orthonormal(epsilon) && self.0.determinant() > 0.0
    }
}

impl std::ops::Mul<na::Vector3<f64>> for &RotationMatrix {
    type Output = na::Vector3<f64>;

    fn mul(self, rhs: na::Vector3<f64>) -> na::Vector3<f64> {
        self.0 * rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn euler_round_trip() {
        let angles = EulerAngles::new(0.3, -0.7, 2.1);
        let back = RotationMatrix::from_euler(angles).to_euler();
        assert_relative_eq!(back.x, angles.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, angles.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, angles.z, epsilon = 1e-12);
    }

    #[test]
    fn rows_and_columns_agree() {
        let rows = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let matrix = RotationMatrix::from_rows(rows);
        assert_eq!(matrix.to_rows(), rows);
        assert_eq!(matrix.column(0), na::Vector3::new(0.0, 1.0, 0.0));
        assert!(matrix.is_orthonormal(1e-9));
        assert_relative_eq!(matrix.to_euler().z, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn composition_is_z_then_y_then_x() {
        let angles = EulerAngles::new(0.2, 0.4, 0.6);
        let expected = na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), 0.6)
            * na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), 0.4)
            * na::Rotation3::from_axis_angle(&na::Vector3::x_axis(), 0.2);
        assert_relative_eq!(
            *RotationMatrix::from_euler(angles).matrix(),
            expected.into_inner(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn skewed_matrix_is_not_orthonormal() {
        let matrix = RotationMatrix::from_rows([[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(!matrix.is_orthonormal(1e-6));
    }

    #[test]
    fn reflection_is_orthonormal_but_not_a_rotation() {
        let matrix = RotationMatrix::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]]);
        assert!(matrix.is_orthonormal(1e-9));
        assert!(!matrix.is_rotation(1e-9));
        assert!(RotationMatrix::from_euler(EulerAngles::new(0.3, 1.1, -2.0)).is_rotation(1e-9));
    }

    #[test]
    fn quaternion_round_trip() {
        let matrix = RotationMatrix::from_euler(EulerAngles::new(-1.0, 0.25, 3.0));
        let back = RotationMatrix::from_quaternion(&matrix.to_quaternion());
        assert_relative_eq!(*back.matrix(), *matrix.matrix(), epsilon = 1e-12);
    }
}
