use serde::{Deserialize, Serialize};

/// Status reported by the device after its initialization handshake.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// System status, `0` is idle
    pub system_status: u8,
    /// Self-test result bits (accelerometer, magnetometer, gyroscope, MCU)
    pub self_test: u8,
    /// System error code, `0` is no error
    pub system_error: u8,
}

impl DeviceStatus {
    pub const SELF_TEST_ALL: u8 = 0x0F;

    pub const fn self_test_passed(&self) -> bool {
        self.self_test & Self::SELF_TEST_ALL == Self::SELF_TEST_ALL
    }
}

/// Calibration level of the device's internal sensor fusion, per sensor.
/// Each value ranges from `0` (uncalibrated) to `3` (fully calibrated).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStatus {
    pub sys: u8,
    pub gyr: u8,
    pub acc: u8,
    pub mag: u8,
}

impl FusionStatus {
    pub const FULLY_CALIBRATED: u8 = 3;

    pub const fn is_fully_calibrated(&self) -> bool {
        self.sys >= Self::FULLY_CALIBRATED
            && self.gyr >= Self::FULLY_CALIBRATED
            && self.acc >= Self::FULLY_CALIBRATED
            && self.mag >= Self::FULLY_CALIBRATED
    }
}
