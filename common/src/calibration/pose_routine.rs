//! Two-pose calibration of a body-mounted IMU.
//!
//! The user holds the device in a neutral pose (e.g. looking forward), then
//! tilts it down (e.g. looking down). The gravity directions measured in the
//! two poses span a reference frame, which does not rely on magnetic north:
//!
//! - `z` points opposite to gravity in the neutral pose (up),
//! - `y` is perpendicular to both gravity captures (the tilt axis),
//! - `x` completes the right-handed frame (forward, towards the tilt).
//!
//! The rotation from the device frame into that frame is applied to every
//! subsequent orientation reading, relative to the neutral orientation.

use log::warn;
use nalgebra::{Quaternion, Vector3};

use super::{CalibrationState, PoseCalib};
use crate::errors::CalibrationError;
use crate::utils::rotation::{quat_from_basis, try_unit, try_unit_vector, MIN_NORM};

/// Stored gravity directions are unit vectors, anything much shorter is unset.
const MIN_UNIT_NORM: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    /// No calibration is in progress
    Idle,
    /// The neutral pose is captured, waiting for the down pose. The capture
    /// only replaces the active calibration once the down pose is solved.
    NeutralCaptured {
        idle_conj: Quaternion<f32>,
        gravity_neutral: Vector3<f32>,
    },
}

#[derive(Debug, Clone)]
pub struct PoseCalibrator {
    config: PoseCalib,
    state: CalibrationState,
    phase: Phase,
}

impl Default for PoseCalibrator {
    fn default() -> Self {
        Self::new(PoseCalib::default())
    }
}

impl PoseCalibrator {
    pub fn new(config: PoseCalib) -> Self {
        Self {
            config,
            state: CalibrationState::default(),
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// First step: capture the neutral orientation and its gravity direction.
    ///
    /// The active calibration is unchanged until [`Self::capture_down`]
    /// succeeds.
    pub fn capture_neutral(
        &mut self,
        raw_quat: &Quaternion<f32>,
        raw_gravity: &Vector3<f32>,
    ) -> Result<(), CalibrationError> {
        let quat = try_unit(raw_quat).ok_or(CalibrationError::DegenerateQuaternion)?;
        let gravity = try_unit_vector(&-*raw_gravity, self.config.min_gravity_norm)
            .ok_or(CalibrationError::DegenerateGravity)?;

        self.phase = Phase::NeutralCaptured {
            idle_conj: quat.into_inner().conjugate(),
            gravity_neutral: gravity,
        };
        Ok(())
    }

    /// Second step: capture the gravity direction of the down pose, and
    /// recompute the correction from both captures.
    ///
    /// On failure the previous calibration is left untouched, and the
    /// routine must be restarted from the neutral pose.
    pub fn capture_down(&mut self, raw_gravity: &Vector3<f32>) -> Result<(), CalibrationError> {
        let Phase::NeutralCaptured {
            idle_conj,
            gravity_neutral,
        } = core::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return Err(CalibrationError::NeutralNotCaptured);
        };

        let gravity_down = try_unit_vector(&-*raw_gravity, self.config.min_gravity_norm)
            .ok_or(CalibrationError::DegenerateGravity)?;

        let (cal_left, cal_right) = self.solve(&gravity_neutral, &gravity_down)?;

        self.state = CalibrationState {
            idle_conj,
            gravity_neutral,
            gravity_down,
            cal_left,
            cal_right,
        };
        Ok(())
    }

    /// Recompute the correction pair from the stored gravity directions.
    pub fn recompute(&mut self) -> Result<(), CalibrationError> {
        let (cal_left, cal_right) =
            self.solve(&self.state.gravity_neutral, &self.state.gravity_down)?;

        self.state.cal_left = cal_left;
        self.state.cal_right = cal_right;
        Ok(())
    }

    /// Transform a raw device orientation into the calibrated frame.
    pub fn apply(&self, raw_quat: &Quaternion<f32>) -> Quaternion<f32> {
        let relative = self.state.idle_conj * raw_quat;
        let corrected = self.state.cal_left * relative;
        corrected * self.state.cal_right
    }

    /// Replace the calibration with a loaded one.
    ///
    /// The correction pair is recomputed from the gravity directions when
    /// possible. Otherwise the stored pair is kept if it holds rotations,
    /// and identity is used if not.
    pub fn restore(&mut self, state: CalibrationState) {
        const ID: &str = "pose_calibrator";

        self.phase = Phase::Idle;
        self.state = state;

        if try_unit(&self.state.idle_conj).is_none() {
            warn!("{}: Restored neutral orientation is degenerate, using identity", ID);
            self.state.idle_conj = Quaternion::identity();
        }

        if self.recompute().is_err()
            && (try_unit(&state.cal_left).is_none() || try_unit(&state.cal_right).is_none())
        {
            warn!("{}: Restored correction is degenerate, using identity", ID);
            self.state.cal_left = Quaternion::identity();
            self.state.cal_right = Quaternion::identity();
        }
    }

    /// Forget any calibration, going back to identity.
    pub fn reset(&mut self) {
        self.state = CalibrationState::default();
        self.phase = Phase::Idle;
    }

    fn solve(
        &self,
        gravity_neutral: &Vector3<f32>,
        gravity_down: &Vector3<f32>,
    ) -> Result<(Quaternion<f32>, Quaternion<f32>), CalibrationError> {
        let gravity_neutral = try_unit_vector(gravity_neutral, MIN_UNIT_NORM)
            .ok_or(CalibrationError::DegenerateGravity)?;
        let gravity_down = try_unit_vector(gravity_down, MIN_UNIT_NORM)
            .ok_or(CalibrationError::DegenerateGravity)?;

        let z = -gravity_neutral;

        let y = try_unit_vector(
            &gravity_down.cross(&gravity_neutral),
            self.config.min_pose_separation,
        )
        .ok_or(CalibrationError::CoincidentPoses)?;

        let x = try_unit_vector(&y.cross(&z), MIN_NORM).ok_or(CalibrationError::CoincidentPoses)?;

        let calibration = quat_from_basis(&x, &y, &z);
        Ok((calibration.conjugate(), calibration))
    }
}
