use std::time::{Duration, Instant};

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum HeadtrackError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("Calibration storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("The background worker could not be started: {0}")]
    WorkerSpawn(std::io::ErrorKind),
}

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceError {
    #[error("The device is not responding after {millis} ms.")]
    Timeout { millis: u64 },
    #[error("The device was not identified correctly.")]
    IdentificationError,
    #[error("The device did not complete its initialization sequence.")]
    InitFailed,
    #[error("Bus transfer with the device failed.")]
    Bus,
    #[error("The device returned a non-finite or out of range value.")]
    BadData,
}

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum CalibrationError {
    #[error("The gravity vector is too short to be normalized, is the device reporting gravity?")]
    DegenerateGravity,
    #[error("The neutral and down poses are too close to define a reference frame.")]
    CoincidentPoses,
    #[error("The down pose was captured before the neutral pose.")]
    NeutralNotCaptured,
    #[error("The orientation quaternion is too short to be normalized.")]
    DegenerateQuaternion,
}

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreError {
    #[error("No calibration file was found.")]
    NotFound,
    #[error("The calibration file is corrupt ({len} bytes).")]
    Corrupt { len: usize },
    #[error("I/O error: {0}")]
    Io(std::io::ErrorKind),
    #[error("Postcard ser/de error: {0}")]
    Postcard(#[from] PostcardError),
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound,
            kind => StoreError::Io(kind),
        }
    }
}

/// Subset of the error type used by Postcard, kept `Copy` so it can live
/// inside [`HeadtrackError`].
#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum PostcardError {
    #[error("The serialize buffer is full")]
    SerializeBufferFull,
    #[error("Hit the end of buffer, expected more data")]
    DeserializeUnexpectedEnd,
    #[error("The original data was not well encoded")]
    DeserializeBadEncoding,
    #[error("Some other serialization error occured")]
    Other,
}

impl From<postcard::Error> for PostcardError {
    fn from(value: postcard::Error) -> Self {
        match value {
            postcard::Error::SerializeBufferFull => Self::SerializeBufferFull,
            postcard::Error::DeserializeUnexpectedEnd => Self::DeserializeUnexpectedEnd,
            postcard::Error::DeserializeBadEncoding => Self::DeserializeBadEncoding,
            _ => Self::Other,
        }
    }
}

impl From<postcard::Error> for StoreError {
    fn from(value: postcard::Error) -> Self {
        StoreError::Postcard(value.into())
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandError {
    #[error("The command queue is full, try again later.")]
    QueueFull,
    #[error("The worker has stopped, and no further commands can be made.")]
    Closed,
    #[error("No acknowledgment was received within {millis} ms.")]
    Timeout { millis: u64 },
    #[error("The command was dropped before it was acknowledged.")]
    Dropped,
    #[error("Unknown command: expected calibrate-neutral, calibrate-down, save or load.")]
    Unknown,
}

/// Suppresses repeats of the same error within a time window.
pub struct Debounce<T> {
    duration: Duration,
    inner: Option<(Instant, T)>,
}

impl<T: PartialEq + Clone> Debounce<T> {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            inner: None,
        }
    }

    pub fn evaluate(&mut self, error: T) -> Option<T> {
        if self
            .inner
            .as_ref()
            .is_none_or(|(t, e)| t.elapsed() > self.duration || e != &error)
        {
            self.inner = Some((Instant::now(), error.clone()));
            Some(error)
        } else {
            None
        }
    }

    /// Forget the last seen error, so the next one is let through.
    pub fn reset(&mut self) {
        self.inner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_suppresses_repeats() {
        let mut debounce = Debounce::new(Duration::from_secs(60));
        assert_eq!(debounce.evaluate(DeviceError::Bus), Some(DeviceError::Bus));
        assert_eq!(debounce.evaluate(DeviceError::Bus), None);
        assert_eq!(
            debounce.evaluate(DeviceError::BadData),
            Some(DeviceError::BadData)
        );
        debounce.reset();
        assert_eq!(debounce.evaluate(DeviceError::BadData), Some(DeviceError::BadData));
    }

    #[test]
    fn io_not_found_maps_to_store_not_found() {
        let error = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(StoreError::from(error), StoreError::NotFound);

        let error = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            StoreError::from(error),
            StoreError::Io(std::io::ErrorKind::PermissionDenied)
        );
    }
}
