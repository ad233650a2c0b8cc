//! `forcectl-hal` – Force-Control Hardware Abstraction Layer
//!
//! Everything the actuator state machine needs from the outside world, behind
//! narrow interfaces so the hardware and the file sinks can be swapped without
//! touching protocol or sequencing logic.
//!
//! # Modules
//!
//! - [`driver`] – [`ForceDriver`][driver::ForceDriver]: the blocking,
//!   fallible capability set of a force-controlled linear actuator (tare,
//!   absolute move, seek-surface, press profile, scope sampling, error query).
//! - [`sim`] – [`SimForcer`][sim::SimForcer]: an in-process simulated driver
//!   that records every call in a shared [`CallLog`][sim::CallLog] so tests
//!   can assert on ordering and arguments without hardware.
//! - [`trace`] – [`TraceRecorder`][trace::TraceRecorder]: writes sampled force
//!   traces to the session's CSV file (sectioned append or overwrite).
//! - [`plot`] – [`TracePlotter`][plot::TracePlotter]: renders a press trace to
//!   a plot file ([`SvgPlotter`][plot::SvgPlotter]) or discards it
//!   ([`NullPlotter`][plot::NullPlotter]).

pub mod driver;
pub mod plot;
pub mod sim;
pub mod trace;

pub use driver::ForceDriver;
pub use plot::{NullPlotter, SvgPlotter, TracePlotter};
pub use sim::{CallLog, DriverCall, SimConfig, SimForcer};
pub use trace::TraceRecorder;
