pub mod engine;
pub mod reading;
