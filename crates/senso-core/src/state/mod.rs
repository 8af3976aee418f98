//! State machine module.

pub mod machine;

pub use machine::{DeviceMode, DeviceState, Transition, Trigger};
