//! Shared run state
//!
//! This module provides the state that workers share during a run.
//!
//! # Components
//!
//! - `HostLimiter`: Bounds concurrent in-flight requests per destination host
//! - `RunControl`: Pause, resume and cancel signals scoped to one run

mod host_state;
mod run_control;

// Re-export main types
pub use host_state::{HostLimiter, HostSlot, HostState};
pub use run_control::{ControlSignal, ControlState, RunControl};
