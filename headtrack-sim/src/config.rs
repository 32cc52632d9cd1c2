use serde::{Deserialize, Serialize};

/// Configuration of the simulated device.
///
/// Any fields not defined will be initialized with their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Orientation of the device relative to the head, `[roll, pitch, yaw]` in radians
    pub mount: [f32; 3],
    /// Initial orientation of the head, `[roll, pitch, yaw]` in radians
    pub initial: [f32; 3],
    /// Magnetic field in the world frame [uT]
    pub magnetic_field: [f32; 3],
    /// Number of reads before the simulated fusion reports full calibration
    pub fusion_settle_reads: u32,
    /// Make the device handshake fail
    pub fail_init: bool,
    pub acc_noise: NoiseConfig,
    pub gyr_noise: NoiseConfig,
    pub mag_noise: NoiseConfig,
    pub gravity_noise: NoiseConfig,
    /// Noise on the fused orientation, as a rotation vector [rad]
    pub orientation_noise: NoiseConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mount: [0.0; 3],
            initial: [0.0; 3],
            magnetic_field: [20.0, 0.0, -40.0],
            fusion_settle_reads: 100,
            fail_init: false,
            acc_noise: NoiseConfig::std_dev(0.02),
            gyr_noise: NoiseConfig::std_dev(0.002),
            mag_noise: NoiseConfig::std_dev(0.5),
            gravity_noise: NoiseConfig::std_dev(0.01),
            orientation_noise: NoiseConfig::std_dev(0.0005),
        }
    }
}

impl SimConfig {
    /// A device without any noise, that is calibrated from the first read.
    pub fn ideal() -> Self {
        Self {
            fusion_settle_reads: 0,
            acc_noise: NoiseConfig::default(),
            gyr_noise: NoiseConfig::default(),
            mag_noise: NoiseConfig::default(),
            gravity_noise: NoiseConfig::default(),
            orientation_noise: NoiseConfig::default(),
            ..Default::default()
        }
    }
}

/// Gaussian noise and constant bias added to each axis of a measurement.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub std_dev: Option<[f32; 3]>,
    pub bias: Option<[f32; 3]>,
}

impl NoiseConfig {
    pub const fn std_dev(std_dev: f32) -> Self {
        Self {
            std_dev: Some([std_dev; 3]),
            bias: None,
        }
    }
}
