//! Real-time side of an instance: one audio unit per output selection.
//!
//! Nothing in here blocks, allocates or logs. The unit only reads the shared
//! sample buffer and the task state, and moves the task state into a command
//! state on trigger edges.

use std::sync::Arc;

use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::signals::{Signals, TaskState};

/// Output selection of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OutputChannel {
    /// Acceleration, `[x, y, z]`
    Acc = 0,
    /// Angular velocity, `[x, y, z]`
    Gyr = 1,
    /// Magnetic field, `[x, y, z]`
    Mag = 2,
    /// Calibrated orientation, `[pitch, roll, yaw]`
    Orientation = 3,
    Yaw = 4,
    Pitch = 5,
    Roll = 6,
}

impl Default for OutputChannel {
    fn default() -> Self {
        OutputChannel::Orientation
    }
}

impl OutputChannel {
    pub const MAX_OUTPUTS: usize = 3;

    pub const fn num_outputs(self) -> usize {
        match self {
            OutputChannel::Yaw | OutputChannel::Pitch | OutputChannel::Roll => 1,
            _ => 3,
        }
    }

    /// Channel from a selector input value, rounded to the nearest integer.
    /// Values out of range select the orientation.
    pub fn from_input(value: f32) -> Self {
        let value = value.round();
        if !(0.0..=u8::MAX as f32).contains(&value) {
            return Self::default();
        }
        Self::try_from(value as u8).unwrap_or_default()
    }
}

/// Rising edge detector. Fires when the previous sample was `<= 0` and the
/// current one is `> 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trigger {
    prev: f32,
}

impl Trigger {
    pub fn process(&mut self, sample: f32) -> bool {
        let fired = self.prev <= 0.0 && sample > 0.0;
        self.prev = sample;
        fired
    }
}

/// Trigger input buffers of one audio block. Shorter buffers read as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerInputs<'a> {
    pub calibrate: &'a [f32],
    pub load: &'a [f32],
    pub save: &'a [f32],
}

impl TriggerInputs<'_> {
    fn len(&self) -> usize {
        self.calibrate.len().max(self.load.len()).max(self.save.len())
    }

    fn at(&self, idx: usize) -> [f32; 3] {
        let get = |buf: &[f32]| buf.get(idx).copied().unwrap_or(0.0);
        [get(self.calibrate), get(self.load), get(self.save)]
    }
}

/// Output values of a single sample, one per output channel.
pub type Frame = Vec<f32, { OutputChannel::MAX_OUTPUTS }>;

pub struct Unit {
    channel: OutputChannel,
    signals: Arc<Signals>,
    calibrate: Trigger,
    load: Trigger,
    save: Trigger,
}

impl Unit {
    pub fn new(signals: Arc<Signals>, channel: OutputChannel) -> Self {
        Self {
            channel,
            signals,
            calibrate: Trigger::default(),
            load: Trigger::default(),
            save: Trigger::default(),
        }
    }

    pub fn channel(&self) -> OutputChannel {
        self.channel
    }

    pub fn set_channel(&mut self, channel: OutputChannel) {
        self.channel = channel;
    }

    pub fn num_outputs(&self) -> usize {
        self.channel.num_outputs()
    }

    /// Process a single sample: detect trigger edges, then produce the
    /// output values for the selected channel.
    pub fn next(&mut self, calibrate: f32, load: f32, save: f32) -> Frame {
        self.handle_triggers(calibrate, load, save);
        self.frame()
    }

    /// Process a block of samples. `outputs` holds one buffer per output
    /// channel, extra buffers are left untouched.
    ///
    /// Every trigger sample is processed, even when there are fewer output
    /// samples, so no edge is lost.
    pub fn process_block(&mut self, inputs: &TriggerInputs<'_>, outputs: &mut [&mut [f32]]) {
        let out_len = outputs.iter().map(|out| out.len()).max().unwrap_or(0);

        for idx in 0..out_len.max(inputs.len()) {
            let [calibrate, load, save] = inputs.at(idx);
            let frame = self.next(calibrate, load, save);
            for (out, value) in outputs.iter_mut().zip(frame) {
                if let Some(slot) = out.get_mut(idx) {
                    *slot = value;
                }
            }
        }
    }

    fn handle_triggers(&mut self, calibrate: f32, load: f32, save: f32) {
        // Edge detectors always advance, so edges seen during a command are dropped
        let calibrate = self.calibrate.process(calibrate);
        let load = self.load.process(load);
        let save = self.save.process(save);

        let state = self.signals.task.load();
        if state == TaskState::Stop || state.is_command() {
            return;
        }

        let target = if calibrate {
            match state {
                TaskState::CalibrateIdle => TaskState::CalibrateStep2,
                _ => TaskState::CalibrateStep1,
            }
        } else if load {
            TaskState::Load
        } else if save {
            TaskState::Save
        } else {
            return;
        };

        // Loses against the worker picking up a queued command, which is fine
        self.signals.task.transition(state, target);
    }

    fn frame(&self) -> Frame {
        let count = self.channel.num_outputs();

        if self.signals.task.load() != TaskState::Run {
            return core::iter::repeat(0.0).take(count).collect();
        }

        let sample = &self.signals.sample;
        let values = match self.channel {
            OutputChannel::Acc => sample.read_acc(),
            OutputChannel::Gyr => sample.read_gyr(),
            OutputChannel::Mag => sample.read_mag(),
            OutputChannel::Orientation => {
                let [yaw, pitch, roll] = sample.read_orientation();
                [pitch, roll, yaw]
            }
            OutputChannel::Yaw => [sample.read_orientation()[0]; 3],
            OutputChannel::Pitch => [sample.read_orientation()[1]; 3],
            OutputChannel::Roll => [sample.read_orientation()[2]; 3],
        };

        values.into_iter().take(count).collect()
    }
}
