/// The gravitational constant [m/s^2]
pub const GRAVITY: f32 = 9.81;

/// Largest acceleration magnitude accepted from the device per axis [m/s^2]
pub const MAX_ACC: f32 = 16.0 * GRAVITY;

/// Largest angular velocity accepted from the device per axis [rad/s]
pub const MAX_GYR: f32 = 40.0;

/// Largest magnetic field accepted from the device per axis [uT]
pub const MAX_MAG: f32 = 2600.0;
