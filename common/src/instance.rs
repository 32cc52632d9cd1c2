//! Lifecycle of a single sensor pipeline.

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{error, info};

use crate::errors::HeadtrackError;
use crate::hw_abstraction::FusedImu;
use crate::signals::{Signals, TaskState};
use crate::tasks::commander::{self, Commander};
use crate::tasks::orientation_worker::Worker;
use crate::types::config::PipelineConfig;
use crate::types::measurements::OrientationSample;
use crate::types::status::FusionStatus;
use crate::unit::{OutputChannel, Unit};

/// One device, its background worker, and the state shared with the audio
/// units attached to it.
///
/// Instances are independent of each other. Several units can be attached to
/// the same instance, e.g. one per output channel, and then share its device,
/// calibration and task state.
pub struct Instance {
    signals: Arc<Signals>,
    commander: Commander,
    worker: Option<JoinHandle<()>>,
}

impl Instance {
    /// Take ownership of the device and start the background worker.
    pub fn start<S: FusedImu + 'static>(imu: S, config: PipelineConfig) -> Result<Self, HeadtrackError> {
        const ID: &str = "instance";

        let signals = Arc::new(Signals::new());
        let (commander, queue) = commander::channel(config.command_queue_len, config.command_timeout());
        let worker = Worker::new(imu, signals.clone(), queue, config);

        let handle = std::thread::Builder::new()
            .name("headtrack-worker".into())
            .spawn(move || worker.run())
            .map_err(|error| {
                error!("{}: Could not spawn worker thread: {}", ID, error);
                HeadtrackError::WorkerSpawn(error.kind())
            })?;

        info!("{}: Worker started", ID);

        Ok(Self {
            signals,
            commander,
            worker: Some(handle),
        })
    }

    /// Attach a new audio unit to this instance.
    pub fn unit(&self, channel: OutputChannel) -> Unit {
        Unit::new(self.signals.clone(), channel)
    }

    /// Handle to the out-of-band command interface.
    pub fn commander(&self) -> Commander {
        self.commander.clone()
    }

    pub fn task_state(&self) -> TaskState {
        self.signals.task.load()
    }

    /// The latest published sample.
    pub fn latest(&self) -> OrientationSample {
        self.signals.sample.read()
    }

    /// Calibration status of the device's internal fusion.
    pub fn fusion_status(&self) -> FusionStatus {
        self.signals.fusion_status()
    }

    /// Stop the worker and wait for it to exit. The device is released when
    /// the worker exits. Outputs of attached units are zero from here on.
    pub fn shutdown(&mut self) {
        self.signals.halt();

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("instance: Worker thread panicked");
            }
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.shutdown();
    }
}
