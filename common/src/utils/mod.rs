pub mod rotation;
pub mod ticker;
