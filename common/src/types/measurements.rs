use serde::{Deserialize, Serialize};

use crate::consts::{MAX_ACC, MAX_GYR, MAX_MAG};
use crate::types::status::FusionStatus;
use crate::utils::rotation::Euler;

/// A single snapshot read from a fused 9-DoF IMU.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Acceleration in `m/s^2`
    pub acc: [f32; 3],
    /// Angular velocity in `rad/s`
    pub gyr: [f32; 3],
    /// Magnetic field in `uT`
    pub mag: [f32; 3],
    /// Fused orientation reported by the device, ordered `[w, x, y, z]`
    pub quat: [f32; 4],
    /// Calibration status of the device's own fusion algorithm
    pub status: FusionStatus,
}

impl Default for RawSample {
    fn default() -> Self {
        Self {
            acc: [0.0; 3],
            gyr: [0.0; 3],
            mag: [0.0; 3],
            quat: [1.0, 0.0, 0.0, 0.0],
            status: FusionStatus::default(),
        }
    }
}

/// The latest motion state, as exposed to the audio path.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub acc: [f32; 3],
    pub gyr: [f32; 3],
    pub mag: [f32; 3],
    pub orientation: Euler,
}

impl OrientationSample {
    /// Whether every field is finite and inside the physical range of the device.
    pub fn is_valid(&self) -> bool {
        let within = |vec: &[f32; 3], limit: f32| vec.iter().all(|v| v.is_finite() && v.abs() <= limit);

        within(&self.acc, MAX_ACC)
            && within(&self.gyr, MAX_GYR)
            && within(&self.mag, MAX_MAG)
            && self.orientation.is_in_range()
    }
}
