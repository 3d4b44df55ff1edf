//! Activation gate

pub mod gate;

pub use gate::{is_active, ActivationReason};
