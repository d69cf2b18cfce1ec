//! Application-level orchestration.
//!
//! This module owns run lifecycle control (start/stop/quit) on the runtime. UI layers
//! send commands here and receive engine events back, keeping responsibilities separated.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
