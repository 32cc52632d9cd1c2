pub mod config;
pub mod measurements;
pub mod status;
