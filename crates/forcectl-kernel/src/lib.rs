//! `forcectl-kernel` – Actuator Session State Machine
//!
//! Owns the single force-control driver handle of the process and sequences
//! driver calls for every protocol command.
//!
//! # Modules
//!
//! - [`controller`] – [`ForceController`][controller::ForceController]:
//!   tracks session state (startup connection status, trace section counter,
//!   cached surface position) and maps each
//!   [`Command`][forcectl_types::Command] to its driver call sequence,
//!   writing press and force-read traces through
//!   [`TraceRecorder`][forcectl_hal::TraceRecorder].

pub mod controller;

pub use controller::{
    AUTO_SEEK_TOUCH_FORCE, CONNECTION_FAILED, ControllerConfig, FORCE_SCALE, ForceController,
    SEEK_VELOCITY_LIMIT, SURFACE_PULLBACK,
};
