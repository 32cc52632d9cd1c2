use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the calibration file placed in the user's home directory.
pub const CALIBRATION_FILE_NAME: &str = ".headtrack_calibration";

/// Configuration of an orientation pipeline instance.
///
/// Any fields not defined will be initialized with their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rate of background device reads, independent of the audio rate [Hz]
    pub read_rate_hz: u16,
    /// Calibration file used by trigger-initiated save and load
    pub calibration_path: PathBuf,
    /// Gravity readings shorter than this are rejected during calibration [m/s^2]
    pub min_gravity_norm: f32,
    /// Minimum sine of the angle between the neutral and down gravity captures
    pub min_pose_separation: f32,
    /// Number of commands that can be queued for the worker
    pub command_queue_len: usize,
    /// How long a command request waits for its acknowledgment [ms]
    pub command_timeout_ms: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_rate_hz: 100,
            calibration_path: default_calibration_path(),
            min_gravity_norm: 1.0,
            min_pose_separation: 0.05,
            command_queue_len: 4,
            command_timeout_ms: 2000,
        }
    }
}

impl PipelineConfig {
    pub fn read_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.read_rate_hz.max(1) as u64)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms as u64)
    }
}

/// `$HOME/.headtrack_calibration`, or the working directory if `HOME` is not set.
pub fn default_calibration_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(CALIBRATION_FILE_NAME)
}
