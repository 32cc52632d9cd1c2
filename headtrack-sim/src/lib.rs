//! Simulated body-mounted 9-DoF IMU with on-chip sensor fusion.
//!
//! The head pose is scripted through a [`SimHandle`], and the device, mounted
//! on the head with an arbitrary orientation, reports the corresponding
//! readings in its own frame.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use common::consts::GRAVITY;
use common::errors::DeviceError;
use common::hw_abstraction::FusedImu;
use common::types::measurements::RawSample;
use common::types::status::{DeviceStatus, FusionStatus};
use common::utils::rotation::quat_to_wxyz;
use nalgebra::{UnitQuaternion, Vector3};

pub mod config;
mod distortion;

use config::SimConfig;
use distortion::Distortion;

type E = Box<dyn std::error::Error>;

/// System status reported once the fusion algorithm is running.
const STATUS_FUSION_RUNNING: u8 = 5;

#[derive(Debug, Clone)]
pub struct SimState {
    /// Orientation of the head in the world frame
    pub head: UnitQuaternion<f32>,
    /// Angular velocity of the head in the world frame [rad/s]
    pub ang_velocity: Vector3<f32>,
    /// Orientation of the device relative to the head
    pub mount: UnitQuaternion<f32>,
    pub fail_init: bool,
    pub fail_reads: bool,
    /// Report a zero gravity vector, as a device with fusion disabled would
    pub zero_gravity: bool,
}

impl SimState {
    /// Orientation of the device in the world frame.
    pub fn device(&self) -> UnitQuaternion<f32> {
        self.head * self.mount
    }
}

#[derive(Debug, Clone)]
pub struct SimHandle(Arc<RwLock<SimState>>);

impl SimHandle {
    pub fn new(config: &SimConfig) -> Self {
        let [roll, pitch, yaw] = config.initial;
        let [mount_roll, mount_pitch, mount_yaw] = config.mount;

        Self(Arc::new(RwLock::new(SimState {
            head: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            ang_velocity: Vector3::zeros(),
            mount: UnitQuaternion::from_euler_angles(mount_roll, mount_pitch, mount_yaw),
            fail_init: config.fail_init,
            fail_reads: false,
            zero_gravity: false,
        })))
    }

    pub fn state(&self) -> SimState {
        self.read().clone()
    }

    pub fn set_head(&self, head: UnitQuaternion<f32>) {
        self.write().head = head;
    }

    /// Set the head orientation from yaw, pitch and roll in radians.
    pub fn set_head_ypr(&self, yaw: f32, pitch: f32, roll: f32) {
        self.set_head(UnitQuaternion::from_euler_angles(roll, pitch, yaw));
    }

    pub fn set_ang_velocity(&self, ang_velocity: Vector3<f32>) {
        self.write().ang_velocity = ang_velocity;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.write().fail_reads = fail;
    }

    pub fn set_zero_gravity(&self, zero: bool) {
        self.write().zero_gravity = zero;
    }

    fn read(&self) -> RwLockReadGuard<'_, SimState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SimState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimulatedImu {
    pub sim: SimHandle,
    magnetic_field: Vector3<f32>,
    settle_reads: u32,
    reads: u32,
    acc_dist: Distortion,
    gyr_dist: Distortion,
    mag_dist: Distortion,
    grav_dist: Distortion,
    quat_dist: Distortion,
}

impl SimulatedImu {
    pub fn new(sim: SimHandle, config: &SimConfig) -> Result<Self, E> {
        Ok(Self {
            sim,
            magnetic_field: Vector3::from(config.magnetic_field),
            settle_reads: config.fusion_settle_reads,
            reads: 0,
            acc_dist: Distortion::new_from_cfg(&config.acc_noise)?,
            gyr_dist: Distortion::new_from_cfg(&config.gyr_noise)?,
            mag_dist: Distortion::new_from_cfg(&config.mag_noise)?,
            grav_dist: Distortion::new_from_cfg(&config.gravity_noise)?,
            quat_dist: Distortion::new_from_cfg(&config.orientation_noise)?,
        })
    }

    /// The fusion calibration levels rise linearly until `settle_reads`.
    fn fusion_status(&self) -> FusionStatus {
        let level = match self.settle_reads {
            0 => FusionStatus::FULLY_CALIBRATED,
            settle => {
                let level = self.reads.saturating_mul(FusionStatus::FULLY_CALIBRATED as u32) / settle;
                level.min(FusionStatus::FULLY_CALIBRATED as u32) as u8
            }
        };

        FusionStatus {
            sys: level,
            gyr: level,
            acc: level,
            mag: level,
        }
    }
}

impl FusedImu for SimulatedImu {
    fn initialize(&mut self) -> Result<DeviceStatus, DeviceError> {
        if self.sim.state().fail_init {
            return Err(DeviceError::IdentificationError);
        }

        self.reads = 0;
        Ok(DeviceStatus {
            system_status: STATUS_FUSION_RUNNING,
            self_test: DeviceStatus::SELF_TEST_ALL,
            system_error: 0,
        })
    }

    fn read_raw(&mut self) -> Result<RawSample, DeviceError> {
        let state = self.sim.state();
        if state.fail_reads {
            return Err(DeviceError::Bus);
        }

        let device = state.device();
        let to_device = device.inverse();

        // A stationary device only senses gravity
        let acc = to_device * Vector3::new(0.0, 0.0, GRAVITY);
        let gyr = to_device * state.ang_velocity;
        let mag = to_device * self.magnetic_field;

        let error = UnitQuaternion::from_scaled_axis(self.quat_dist.apply(Vector3::zeros()));
        let quat = device * error;

        self.reads = self.reads.saturating_add(1);
        log::trace!("simulated_imu: Read {} at {:?}", self.reads, device.euler_angles());

        Ok(RawSample {
            acc: self.acc_dist.apply(acc).into(),
            gyr: self.gyr_dist.apply(gyr).into(),
            mag: self.mag_dist.apply(mag).into(),
            quat: quat_to_wxyz(quat.quaternion()),
            status: self.fusion_status(),
        })
    }

    fn read_gravity(&mut self) -> Result<[f32; 3], DeviceError> {
        let state = self.sim.state();
        if state.fail_reads {
            return Err(DeviceError::Bus);
        }

        if state.zero_gravity {
            return Ok([0.0; 3]);
        }

        let gravity = state.device().inverse() * Vector3::new(0.0, 0.0, GRAVITY);
        Ok(self.grav_dist.apply(gravity).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_level_device_reads_gravity_up() {
        let config = SimConfig::ideal();
        let mut imu = SimulatedImu::new(SimHandle::new(&config), &config).unwrap();
        imu.initialize().unwrap();

        let raw = imu.read_raw().unwrap();
        assert_abs_diff_eq!(raw.acc[2], GRAVITY, epsilon = 1e-5);
        assert_eq!(raw.quat, [1.0, 0.0, 0.0, 0.0]);
        assert!(raw.status.is_fully_calibrated());

        let gravity = imu.read_gravity().unwrap();
        assert_abs_diff_eq!(gravity[2], GRAVITY, epsilon = 1e-5);
    }

    #[test]
    fn test_mounting_rotates_readings() {
        let config = SimConfig {
            mount: [0.0, core::f32::consts::FRAC_PI_2, 0.0],
            ..SimConfig::ideal()
        };
        let mut imu = SimulatedImu::new(SimHandle::new(&config), &config).unwrap();

        // Device x axis points down, so gravity is sensed along -x
        let gravity = imu.read_gravity().unwrap();
        assert_abs_diff_eq!(gravity[0], -GRAVITY, epsilon = 1e-5);
        assert_abs_diff_eq!(gravity[2], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_injected_failures() {
        let config = SimConfig {
            fail_init: true,
            ..SimConfig::ideal()
        };
        let sim = SimHandle::new(&config);
        let mut imu = SimulatedImu::new(sim.clone(), &config).unwrap();
        assert_eq!(imu.initialize(), Err(DeviceError::IdentificationError));

        sim.set_fail_reads(true);
        assert_eq!(imu.read_raw(), Err(DeviceError::Bus));

        sim.set_fail_reads(false);
        sim.set_zero_gravity(true);
        assert_eq!(imu.read_gravity(), Ok([0.0; 3]));
    }

    #[test]
    fn test_fusion_status_settles() {
        let config = SimConfig {
            fusion_settle_reads: 3,
            ..SimConfig::ideal()
        };
        let mut imu = SimulatedImu::new(SimHandle::new(&config), &config).unwrap();
        imu.initialize().unwrap();

        let levels: Vec<u8> = (0..4).map(|_| imu.read_raw().unwrap().status.sys).collect();
        assert_eq!(levels, [1, 2, 3, 3]);
    }
}
