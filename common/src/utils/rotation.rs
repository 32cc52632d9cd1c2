use core::f32::consts::{FRAC_PI_2, PI};

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Quaternions and vectors shorter than this are treated as degenerate.
pub const MIN_NORM: f32 = 1e-6;

/// Slack allowed on the angle ranges to absorb rounding.
const ANGLE_TOLERANCE: f32 = 1e-4;

/// Orientation as yaw, pitch and roll, in radians.
///
/// The angles follow the intrinsic Z-Y'-X'' (yaw-pitch-roll) convention,
/// such that the rotation is `R = Rz(yaw) * Ry(pitch) * Rx(roll)`, each
/// angle turning by the right-hand rule around its axis. With the calibrated
/// frame (x forward, y left, z up) looking down gives a positive pitch.
///
/// Yaw and roll lie in `[-pi, pi]`, pitch lies in `[-pi/2, pi/2]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Euler {
    pub const fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Convert a quaternion to Euler angles. The quaternion is normalized
    /// first, and `None` is returned if it is too short to do so.
    pub fn from_quaternion(quat: &Quaternion<f32>) -> Option<Self> {
        let unit = try_unit(quat)?;
        let (roll, pitch, yaw) = unit.euler_angles();
        Some(Euler { yaw, pitch, roll })
    }

    pub fn to_quaternion(self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }

    /// Whether all angles are finite and inside their nominal ranges.
    pub fn is_in_range(&self) -> bool {
        let within = |angle: f32, limit: f32| angle.is_finite() && angle.abs() <= limit + ANGLE_TOLERANCE;
        within(self.yaw, PI) && within(self.pitch, FRAC_PI_2) && within(self.roll, PI)
    }

    /// Angles in output order: yaw, pitch, roll.
    pub fn to_array(self) -> [f32; 3] {
        [self.yaw, self.pitch, self.roll]
    }
}

/// Normalize a quaternion, unless it is too short to do so.
pub fn try_unit(quat: &Quaternion<f32>) -> Option<UnitQuaternion<f32>> {
    if !quat.coords.iter().all(|c| c.is_finite()) {
        return None;
    }
    UnitQuaternion::try_new(*quat, MIN_NORM)
}

/// Normalize a vector, unless it is shorter than `min_norm` or not finite.
pub fn try_unit_vector(vec: &Vector3<f32>, min_norm: f32) -> Option<Vector3<f32>> {
    if !vec.iter().all(|c| c.is_finite()) {
        return None;
    }
    vec.try_normalize(min_norm.max(MIN_NORM))
}

/// Build the quaternion of the rotation matrix whose columns are the
/// (orthonormal, right-handed) basis vectors `x`, `y` and `z`.
pub fn quat_from_basis(
    x: &Vector3<f32>,
    y: &Vector3<f32>,
    z: &Vector3<f32>,
) -> Quaternion<f32> {
    let matrix = Matrix3::from_columns(&[*x, *y, *z]);
    let rotation = Rotation3::from_matrix_unchecked(matrix);
    UnitQuaternion::from_rotation_matrix(&rotation).into_inner()
}

/// Quaternion from its components, ordered `[w, x, y, z]`.
pub fn quat_from_wxyz(wxyz: [f32; 4]) -> Quaternion<f32> {
    let [w, x, y, z] = wxyz;
    Quaternion::new(w, x, y, z)
}

/// Components of a quaternion, ordered `[w, x, y, z]`.
pub fn quat_to_wxyz(quat: &Quaternion<f32>) -> [f32; 4] {
    [quat.w, quat.i, quat.j, quat.k]
}
