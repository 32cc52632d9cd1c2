pub mod commander;
pub mod orientation_worker;
