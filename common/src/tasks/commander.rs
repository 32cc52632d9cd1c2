//! Out-of-band command interface of an instance.
//!
//! Commands are queued for the background worker, which executes them
//! between device reads. A command can be fire-and-forget with
//! [`Commander::send`], or wait for the worker's acknowledgment with
//! [`Commander::request`].

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use crate::errors::{CommandError, HeadtrackError};
use crate::signals::TaskState;

/// Outcome of an executed command.
pub type Response = Result<(), HeadtrackError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture the neutral pose (first calibration step)
    CalibrateNeutral,
    /// Capture the down pose and compute the correction (second step)
    CalibrateDown,
    /// Save the calibration, to the given file or the configured one
    Save(Option<PathBuf>),
    /// Load the calibration, from the given file or the configured one
    Load(Option<PathBuf>),
}

impl Command {
    /// The worker state in which this command is executed.
    pub fn task_state(&self) -> TaskState {
        match self {
            Command::CalibrateNeutral => TaskState::CalibrateStep1,
            Command::CalibrateDown => TaskState::CalibrateStep2,
            Command::Save(_) => TaskState::Save,
            Command::Load(_) => TaskState::Load,
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// Parse `calibrate-neutral`, `calibrate-down`, `save [file]` or `load [file]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();

        let command = match words.next() {
            Some("calibrate-neutral") => Command::CalibrateNeutral,
            Some("calibrate-down") => Command::CalibrateDown,
            Some("save") => Command::Save(words.next().map(PathBuf::from)),
            Some("load") => Command::Load(words.next().map(PathBuf::from)),
            _ => return Err(CommandError::Unknown),
        };

        match words.next() {
            Some(_) => Err(CommandError::Unknown),
            None => Ok(command),
        }
    }
}

/// A queued command, with an optional channel to acknowledge it on.
///
/// Dropping a request without responding notifies the requester.
#[derive(Debug)]
pub struct Request {
    pub command: Command,
    reply: Option<SyncSender<Response>>,
}

impl Request {
    pub fn respond(self, response: Response) {
        if let Some(reply) = self.reply {
            // The requester may have timed out already
            let _ = reply.try_send(response);
        }
    }
}

/// Sending side of the command queue, cheap to clone.
#[derive(Debug, Clone)]
pub struct Commander {
    sender: SyncSender<Request>,
    timeout: Duration,
}

/// Receiving side of the command queue, owned by the worker.
#[derive(Debug)]
pub struct CommandQueue {
    receiver: Receiver<Request>,
}

/// Create a command queue holding up to `len` pending commands. Requests
/// wait up to `timeout` for their acknowledgment.
pub fn channel(len: usize, timeout: Duration) -> (Commander, CommandQueue) {
    let (sender, receiver) = mpsc::sync_channel(len.max(1));
    (Commander { sender, timeout }, CommandQueue { receiver })
}

impl Commander {
    /// Queue a command without waiting for it to be executed.
    pub fn send(&self, command: Command) -> Result<(), CommandError> {
        self.enqueue(Request {
            command,
            reply: None,
        })
    }

    /// Queue a command and wait for the worker to execute it.
    pub fn request(&self, command: Command) -> Response {
        let (reply, response) = mpsc::sync_channel(1);

        self.enqueue(Request {
            command,
            reply: Some(reply),
        })?;

        match response.recv_timeout(self.timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => Err(CommandError::Timeout {
                millis: self.timeout.as_millis() as u64,
            }
            .into()),
            Err(RecvTimeoutError::Disconnected) => Err(CommandError::Dropped.into()),
        }
    }

    fn enqueue(&self, request: Request) -> Result<(), CommandError> {
        self.sender.try_send(request).map_err(|error| match error {
            TrySendError::Full(_) => CommandError::QueueFull,
            TrySendError::Disconnected(_) => CommandError::Closed,
        })
    }
}

impl CommandQueue {
    /// Take the next pending command, if any, without blocking.
    pub fn try_next(&self) -> Option<Request> {
        self.receiver.try_recv().ok()
    }
}
