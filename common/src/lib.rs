//! Calibration and orientation pipeline for body-mounted 9-DoF IMUs with
//! on-chip sensor fusion, running beside a real-time audio path.

pub mod calibration;
pub mod consts;
pub mod errors;
pub mod hw_abstraction;
pub mod instance;
pub mod signals;
pub mod storage;
pub mod tasks;
pub mod types;
pub mod unit;
pub mod utils;

// Re-exported for implementors
pub use heapless;
pub use nalgebra;

pub use instance::Instance;
