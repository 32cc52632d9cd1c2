//! Background worker of an instance.
//!
//! The worker owns the device, the calibration engine and all file I/O. It
//! runs the task state machine at the configured read rate, doing at most one
//! blocking operation per iteration, and publishes validated samples for the
//! audio path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use nalgebra::{Quaternion, Vector3};

use crate::calibration::pose_routine::PoseCalibrator;
use crate::calibration::{CalibrationState, PoseCalib};
use crate::errors::{CalibrationError, Debounce, DeviceError, HeadtrackError, StoreError};
use crate::hw_abstraction::FusedImu;
use crate::signals::{Signals, TaskState};
use crate::storage;
use crate::tasks::commander::{Command, CommandQueue, Request, Response};
use crate::types::config::PipelineConfig;
use crate::types::measurements::{OrientationSample, RawSample};
use crate::types::status::FusionStatus;
use crate::utils::rotation::{quat_from_wxyz, Euler};
use crate::utils::ticker::Ticker;

/// Identical device errors are logged at most this often.
const ERROR_DEBOUNCE: Duration = Duration::from_secs(5);

pub struct Worker<S: FusedImu> {
    name: &'static str,
    imu: S,
    signals: Arc<Signals>,
    queue: CommandQueue,
    config: PipelineConfig,
    calibrator: PoseCalibrator,
    /// Request taken from the queue, waiting for the state to allow it
    pending: Option<Request>,
    /// Request being executed in the current command state
    active: Option<Request>,
    /// Orientation read in the first half of a neutral capture
    neutral_quat: Option<Quaternion<f32>>,
    fusion: Option<FusionStatus>,
    read_errors: Debounce<DeviceError>,
}

impl<S: FusedImu> Worker<S> {
    pub fn new(imu: S, signals: Arc<Signals>, queue: CommandQueue, config: PipelineConfig) -> Self {
        Self {
            name: "orientation_worker",
            imu,
            signals,
            queue,
            calibrator: PoseCalibrator::new(PoseCalib::from(&config)),
            config,
            pending: None,
            active: None,
            neutral_quat: None,
            fusion: None,
            read_errors: Debounce::new(ERROR_DEBOUNCE),
        }
    }

    /// The calibration currently applied to device readings.
    pub fn calibration(&self) -> &CalibrationState {
        self.calibrator.state()
    }

    /// Run the worker until it is stopped. Blocks the calling thread.
    pub fn run(mut self) {
        info!("[{}] Task started", self.name);

        if self.startup() {
            let mut ticker = Ticker::every(self.config.read_interval());
            while self.step() {
                ticker.next();
            }
        }

        info!("[{}] Task stopped", self.name);
    }

    /// Initialize the device. On success the worker moves on to loading the
    /// calibration file, otherwise it stops for good.
    pub fn startup(&mut self) -> bool {
        match self.imu.initialize() {
            Ok(status) => {
                info!(
                    "[{}] Device initialized, system status {}, self-test {:#06b}, system error {}",
                    self.name, status.system_status, status.self_test, status.system_error
                );
                if !status.self_test_passed() {
                    warn!("[{}] Device self-test did not pass: {:#06b}", self.name, status.self_test);
                }

                !self.signals.is_halted() && self.signals.task.transition(TaskState::Stop, TaskState::Load)
            }
            Err(error) => {
                error!("[{}] Device initialization failed: {}", self.name, error);
                self.signals.task.store(TaskState::Stop);
                false
            }
        }
    }

    /// Run a single iteration of the state machine. Returns `false` once the
    /// worker should exit.
    pub fn step(&mut self) -> bool {
        if self.signals.is_halted() {
            return false;
        }

        match self.signals.task.load() {
            TaskState::Stop => return false,
            TaskState::Run => {
                if !self.poll_command(TaskState::Run) {
                    self.update();
                }
            }
            TaskState::CalibrateIdle => {
                self.poll_command(TaskState::CalibrateIdle);
            }
            TaskState::CalibrateStep1 => {
                if let Some(result) = self.capture_neutral() {
                    let next = match result {
                        Ok(()) => TaskState::CalibrateIdle,
                        Err(_) => TaskState::Run,
                    };
                    self.finish(TaskState::CalibrateStep1, next, result);
                }
            }
            TaskState::CalibrateStep2 => {
                let result = self.capture_down();
                self.finish(TaskState::CalibrateStep2, TaskState::Run, result);
            }
            TaskState::Save => {
                let result = self.save();
                self.finish(TaskState::Save, TaskState::Run, result);
            }
            TaskState::Load => {
                let result = self.load();
                self.finish(TaskState::Load, TaskState::Run, result);
            }
        }

        true
    }

    /// Read the device and publish a new sample.
    fn update(&mut self) {
        let raw = match self.imu.read_raw() {
            Ok(raw) => raw,
            Err(error) => return self.report_read_error(error),
        };

        self.track_fusion(raw.status);

        match self.process(&raw) {
            Some(sample) if self.signals.sample.publish(&sample) => {
                // Recovered, so the next failure is reported right away
                self.read_errors.reset();
                trace!("[{}] Published {:?}", self.name, sample.orientation);
            }
            _ => self.report_read_error(DeviceError::BadData),
        }
    }

    fn process(&self, raw: &RawSample) -> Option<OrientationSample> {
        let corrected = self.calibrator.apply(&quat_from_wxyz(raw.quat));
        let orientation = Euler::from_quaternion(&corrected)?;

        Some(OrientationSample {
            acc: raw.acc,
            gyr: raw.gyr,
            mag: raw.mag,
            orientation,
        })
    }

    fn report_read_error(&mut self, error: DeviceError) {
        if let Some(error) = self.read_errors.evaluate(error) {
            warn!("[{}] Skipping device read: {}", self.name, error);
        }
    }

    fn track_fusion(&mut self, status: FusionStatus) {
        if self.fusion == Some(status) {
            return;
        }

        if status.is_fully_calibrated() {
            info!("[{}] Device fusion is fully calibrated", self.name);
        } else {
            debug!(
                "[{}] Device fusion calibration: sys {}, gyr {}, acc {}, mag {}",
                self.name, status.sys, status.gyr, status.acc, status.mag
            );
        }

        self.fusion = Some(status);
        self.signals.set_fusion_status(status);
    }

    /// Take the next command and move into its state. Returns whether a
    /// command was handled.
    fn poll_command(&mut self, state: TaskState) -> bool {
        let Some(request) = self.pending.take().or_else(|| self.queue.try_next()) else {
            return false;
        };

        if request.command == Command::CalibrateDown && state != TaskState::CalibrateIdle {
            warn!("[{}] Ignoring down pose, the neutral pose is not captured", self.name);
            request.respond(Err(CalibrationError::NeutralNotCaptured.into()));
            return true;
        }

        let target = request.command.task_state();
        if self.signals.task.transition(state, target) {
            debug!("[{}] Executing {:?}", self.name, request.command);
            self.active = Some(request);
        } else {
            // A trigger got there first, retry once its command completed
            self.pending = Some(request);
        }

        true
    }

    /// Leave a command state, and acknowledge the command if requested.
    fn finish(&mut self, from: TaskState, to: TaskState, result: Response) {
        if self.signals.task.transition(from, to) {
            debug!("[{}] Transition {:?} -> {:?}", self.name, from, to);
        }

        if let Some(request) = self.active.take() {
            request.respond(result);
        }
    }

    /// Path given with the active command, or the configured one.
    fn calibration_path(&self) -> PathBuf {
        match self.active.as_ref().map(|request| &request.command) {
            Some(Command::Save(Some(path)) | Command::Load(Some(path))) => path.clone(),
            _ => self.config.calibration_path.clone(),
        }
    }

    /// Neutral capture is split in two iterations, one for each device read.
    /// Returns `None` while the capture is in progress.
    fn capture_neutral(&mut self) -> Option<Response> {
        let Some(quat) = self.neutral_quat.take() else {
            return match self.imu.read_raw() {
                Ok(raw) => {
                    self.neutral_quat = Some(quat_from_wxyz(raw.quat));
                    None
                }
                Err(error) => {
                    warn!("[{}] Neutral pose capture failed: {}", self.name, error);
                    Some(Err(error.into()))
                }
            };
        };

        let result = self
            .imu
            .read_gravity()
            .map_err(HeadtrackError::from)
            .and_then(|gravity| {
                Ok(self
                    .calibrator
                    .capture_neutral(&quat, &Vector3::from(gravity))?)
            });

        match &result {
            Ok(()) => info!("[{}] Neutral pose captured, waiting for down pose", self.name),
            Err(error) => warn!("[{}] Neutral pose capture failed: {}", self.name, error),
        }

        Some(result)
    }

    fn capture_down(&mut self) -> Response {
        let result = self
            .imu
            .read_gravity()
            .map_err(HeadtrackError::from)
            .and_then(|gravity| Ok(self.calibrator.capture_down(&Vector3::from(gravity))?));

        match &result {
            Ok(()) => info!("[{}] Calibration completed", self.name),
            Err(error) => warn!(
                "[{}] Down pose capture failed, keeping previous calibration: {}",
                self.name, error
            ),
        }

        result
    }

    fn save(&mut self) -> Response {
        let path = self.calibration_path();

        match storage::save(&path, self.calibrator.state()) {
            Ok(()) => {
                info!("[{}] Calibration saved to {}", self.name, path.display());
                Ok(())
            }
            Err(error) => {
                error!("[{}] Could not save calibration to {}: {}", self.name, path.display(), error);
                Err(error.into())
            }
        }
    }

    /// Restore the calibration from file, or fall back to identity.
    fn load(&mut self) -> Response {
        let path = self.calibration_path();

        match storage::load(&path) {
            Ok(state) => {
                self.calibrator.restore(state);
                info!("[{}] Calibration loaded from {}", self.name, path.display());
                Ok(())
            }
            Err(error) => {
                match error {
                    StoreError::NotFound => {
                        info!("[{}] No calibration at {}, using identity", self.name, path.display())
                    }
                    error => warn!(
                        "[{}] Could not load calibration from {}, using identity: {}",
                        self.name,
                        path.display(),
                        error
                    ),
                }
                self.calibrator.reset();
                Err(error.into())
            }
        }
    }
}
