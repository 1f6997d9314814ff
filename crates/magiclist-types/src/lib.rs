pub mod config;
pub mod general;

pub use general::ShowStatus;
