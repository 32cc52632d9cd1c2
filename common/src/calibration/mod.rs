use nalgebra::{Quaternion, Vector3};

use crate::types::config::PipelineConfig;
use crate::utils::rotation::try_unit;

pub mod pose_routine;

/// Everything needed to turn a raw device orientation into a
/// user-referenced orientation. This is what gets persisted.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CalibrationState {
    /// Conjugate of the raw orientation captured in the neutral pose
    pub idle_conj: Quaternion<f32>,
    /// Direction of gravity in the neutral pose, in the device frame
    pub gravity_neutral: Vector3<f32>,
    /// Direction of gravity in the tilted-down pose, in the device frame
    pub gravity_down: Vector3<f32>,
    pub cal_left: Quaternion<f32>,
    pub cal_right: Quaternion<f32>,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            idle_conj: Quaternion::identity(),
            gravity_neutral: Vector3::zeros(),
            gravity_down: Vector3::zeros(),
            cal_left: Quaternion::identity(),
            cal_right: Quaternion::identity(),
        }
    }
}

impl CalibrationState {
    /// Whether every component is finite and all quaternions are rotations.
    pub fn is_sane(&self) -> bool {
        let finite_vec = |vec: &Vector3<f32>| vec.iter().all(|v| v.is_finite());
        try_unit(&self.idle_conj).is_some()
            && try_unit(&self.cal_left).is_some()
            && try_unit(&self.cal_right).is_some()
            && finite_vec(&self.gravity_neutral)
            && finite_vec(&self.gravity_down)
    }
}

/// Thresholds for the two-pose calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseCalib {
    /// Gravity readings shorter than this are rejected [m/s^2]
    pub min_gravity_norm: f32,
    /// Minimum sine of the angle between the two gravity captures
    pub min_pose_separation: f32,
}

impl Default for PoseCalib {
    fn default() -> Self {
        Self {
            min_gravity_norm: 1.0,
            min_pose_separation: 0.05,
        }
    }
}

impl From<&PipelineConfig> for PoseCalib {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            min_gravity_norm: config.min_gravity_norm,
            min_pose_separation: config.min_pose_separation,
        }
    }
}
