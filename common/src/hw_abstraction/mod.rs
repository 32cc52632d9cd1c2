use crate::errors::DeviceError;
use crate::types::measurements::RawSample;
use crate::types::status::DeviceStatus;

/// An IMU with on-chip sensor fusion, reporting acceleration, angular
/// velocity, magnetic field and a fused orientation quaternion.
///
/// All methods may block on bus I/O, and must only be called from the
/// background worker, never from the audio path.
pub trait FusedImu: Send {
    /// Perform the device handshake and report its self-test status.
    fn initialize(&mut self) -> Result<DeviceStatus, DeviceError>;

    /// Read a full snapshot of all sensors and the fused orientation.
    fn read_raw(&mut self) -> Result<RawSample, DeviceError>;

    /// Read the gravity vector, as estimated by the device, in its own frame.
    fn read_gravity(&mut self) -> Result<[f32; 3], DeviceError>;
}

impl<T: FusedImu + ?Sized> FusedImu for Box<T> {
    fn initialize(&mut self) -> Result<DeviceStatus, DeviceError> {
        (**self).initialize()
    }

    fn read_raw(&mut self) -> Result<RawSample, DeviceError> {
        (**self).read_raw()
    }

    fn read_gravity(&mut self) -> Result<[f32; 3], DeviceError> {
        (**self).read_gravity()
    }
}
