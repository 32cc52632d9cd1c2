//! State shared between the real-time audio path and the background worker.
//!
//! Every value in here is a plain atomic, such that the audio path never
//! blocks, allocates or takes a lock when reading or updating it.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use portable_atomic::{AtomicBool, AtomicF32, AtomicU32, AtomicU8, Ordering};

use crate::types::measurements::OrientationSample;
use crate::types::status::FusionStatus;
use crate::utils::rotation::Euler;

/// Bit set on every state in which the worker executes a one-shot command.
pub const CMD_FLAG: u8 = 0x08;

/// State of the background worker of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TaskState {
    /// Worker exits, outputs are zero. Terminal.
    Stop = 0,
    /// Worker streams device readings into the sample buffer.
    Run = 2,
    /// Neutral pose is captured, waiting for the down pose trigger.
    CalibrateIdle = 4,
    /// Capture the neutral pose.
    CalibrateStep1 = 9,
    /// Capture the down pose and compute the correction.
    CalibrateStep2 = 10,
    /// Write the calibration file.
    Save = 11,
    /// Read the calibration file.
    Load = 12,
}

impl TaskState {
    /// Whether the worker has a pending one-shot command in this state.
    /// All command states have [`CMD_FLAG`] set.
    pub const fn is_command(self) -> bool {
        (self as u8 & CMD_FLAG) != 0
    }
}

/// Atomic cell holding a [`TaskState`].
#[derive(Debug)]
pub struct TaskCell(AtomicU8);

impl Default for TaskCell {
    fn default() -> Self {
        Self::new(TaskState::Stop)
    }
}

impl TaskCell {
    pub const fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> TaskState {
        // Only valid states are ever stored
        TaskState::try_from(self.0.load(Ordering::Acquire)).unwrap_or(TaskState::Stop)
    }

    pub fn store(&self, state: TaskState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Move from `from` to `to`, only if the state is still `from`.
    pub fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from.into(), to.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// The latest validated sample, stored field by field.
///
/// A reader may observe fields from two consecutive samples, but since only
/// validated samples are published, every field is always finite and inside
/// its nominal range.
#[derive(Debug)]
pub struct SampleBuffer {
    acc: [AtomicF32; 3],
    gyr: [AtomicF32; 3],
    mag: [AtomicF32; 3],
    /// Yaw, pitch and roll
    orientation: [AtomicF32; 3],
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer {
    pub const fn new() -> Self {
        Self {
            acc: [const { AtomicF32::new(0.0) }; 3],
            gyr: [const { AtomicF32::new(0.0) }; 3],
            mag: [const { AtomicF32::new(0.0) }; 3],
            orientation: [const { AtomicF32::new(0.0) }; 3],
        }
    }

    /// Publish a new sample. Invalid samples are rejected, leaving the
    /// previous sample in place.
    pub fn publish(&self, sample: &OrientationSample) -> bool {
        if !sample.is_valid() {
            return false;
        }

        store3(&self.acc, &sample.acc);
        store3(&self.gyr, &sample.gyr);
        store3(&self.mag, &sample.mag);
        store3(&self.orientation, &sample.orientation.to_array());
        true
    }

    pub fn read(&self) -> OrientationSample {
        let [yaw, pitch, roll] = load3(&self.orientation);
        OrientationSample {
            acc: load3(&self.acc),
            gyr: load3(&self.gyr),
            mag: load3(&self.mag),
            orientation: Euler::new(yaw, pitch, roll),
        }
    }

    /// Read a single field set, avoiding the copy of the full sample.
    pub fn read_acc(&self) -> [f32; 3] {
        load3(&self.acc)
    }

    pub fn read_gyr(&self) -> [f32; 3] {
        load3(&self.gyr)
    }

    pub fn read_mag(&self) -> [f32; 3] {
        load3(&self.mag)
    }

    /// Yaw, pitch and roll.
    pub fn read_orientation(&self) -> [f32; 3] {
        load3(&self.orientation)
    }
}

fn store3(cells: &[AtomicF32; 3], values: &[f32; 3]) {
    for (cell, value) in cells.iter().zip(values) {
        cell.store(*value, Ordering::Relaxed);
    }
}

fn load3(cells: &[AtomicF32; 3]) -> [f32; 3] {
    core::array::from_fn(|i| cells[i].load(Ordering::Relaxed))
}

/// Everything an instance shares between its worker and its units.
#[derive(Debug, Default)]
pub struct Signals {
    pub task: TaskCell,
    pub sample: SampleBuffer,
    /// Set by the owner to make the worker exit, regardless of its state
    halt: AtomicBool,
    fusion: AtomicU32,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fusion_status(&self, status: FusionStatus) {
        let packed = u32::from_le_bytes([status.sys, status.gyr, status.acc, status.mag]);
        self.fusion.store(packed, Ordering::Relaxed);
    }

    pub fn fusion_status(&self) -> FusionStatus {
        let [sys, gyr, acc, mag] = self.fusion.load(Ordering::Relaxed).to_le_bytes();
        FusionStatus { sys, gyr, acc, mag }
    }

    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::Acquire)
    }

    /// Make the worker exit, and zero all outputs.
    pub fn halt(&self) {
        self.halt.store(true, Ordering::Release);
        self.task.store(TaskState::Stop);
    }
}
