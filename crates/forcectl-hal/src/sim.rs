//! In-process simulated force controller for CI/CD testing without physical
//! hardware.
//!
//! [`SimForcer`] models just enough of a force-controlled linear actuator for
//! the whole stack to run headless: a tare offset, an absolute position, a
//! contact surface with linear stiffness, trapezoidal press profiles and a
//! scope that captures one sample batch per window.
//!
//! Every call is appended to a shared [`CallLog`] before it is applied, so a
//! test can hand the boxed driver to the controller and still assert on the
//! exact call sequence afterwards.  Individual operations can be made to fail
//! with [`SimForcer::with_fault`].
//!
//! # Example
//!
//! ```rust
//! use forcectl_hal::{ForceDriver, SimConfig, SimForcer};
//! use forcectl_hal::sim::DriverCall;
//!
//! let mut sim = SimForcer::new(SimConfig::default());
//! let log = sim.call_log();
//!
//! sim.tare("F1").expect("sim tare must succeed");
//! sim.move_to("F1", 3.0).expect("sim move must succeed");
//!
//! assert_eq!(log.calls()[0], DriverCall::Tare { channel: "F1".into() });
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use forcectl_types::{ControlProfile, DriverError, PressTiming};
use tracing::debug;

use crate::driver::ForceDriver;

// ────────────────────────────────────────────────────────────────────────────
// Call log
// ────────────────────────────────────────────────────────────────────────────

/// One call received by a [`SimForcer`], with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Tare { channel: String },
    MoveTo { channel: String, position: f64 },
    SeekSurface { channel: String, touch_force: f64, vel_limit_mms: f64 },
    SetControlParams { channel: String, profile: ControlProfile },
    PressProfile { channel: String, force: f64, timing: PressTiming },
    InitSampling { channel: String, sample_rate_hz: u32 },
    StartSampling,
    ReadSamples,
    ReadPosition { channel: String },
    ReadForce { channel: String },
    ReadErrors,
    Close,
}

impl DriverCall {
    /// Short operation name, used to select calls for fault injection.
    pub fn name(&self) -> &'static str {
        match self {
            DriverCall::Tare { .. } => "tare",
            DriverCall::MoveTo { .. } => "move_to",
            DriverCall::SeekSurface { .. } => "seek_surface",
            DriverCall::SetControlParams { .. } => "set_control_params",
            DriverCall::PressProfile { .. } => "press_profile",
            DriverCall::InitSampling { .. } => "init_sampling",
            DriverCall::StartSampling => "start_sampling",
            DriverCall::ReadSamples => "read_samples",
            DriverCall::ReadPosition { .. } => "read_position",
            DriverCall::ReadForce { .. } => "read_force",
            DriverCall::ReadErrors => "read_errors",
            DriverCall::Close => "close",
        }
    }
}

/// Cloneable handle onto the calls a [`SimForcer`] has received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DriverCall>>>);

impl CallLog {
    fn push(&self, call: DriverCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    /// Snapshot of every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Names of the recorded calls, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.calls().iter().map(DriverCall::name).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|calls| calls.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.0.lock() {
            calls.clear();
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimForcer
// ────────────────────────────────────────────────────────────────────────────

/// Scope buffer size: a little over four minutes at 250 Hz.
pub const DEFAULT_SCOPE_CAPACITY: usize = 65_536;

/// Physical parameters of the simulated actuator.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Position (mm) at which the probe first touches the surface.
    pub surface_position: f64,
    /// Contact stiffness in driver force units per mm of penetration.
    pub stiffness: f64,
    /// Furthest reachable position (mm).
    pub max_travel: f64,
    /// Samples the scope can hold per capture window.
    pub scope_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            surface_position: 12.5,
            stiffness: 400.0,
            max_travel: 50.0,
            scope_capacity: DEFAULT_SCOPE_CAPACITY,
        }
    }
}

/// Scope state of the simulated controller.
#[derive(Debug, Default)]
struct Scope {
    sample_rate_hz: Option<u32>,
    armed: bool,
    samples: Vec<f64>,
}

/// A simulated force-controlled actuator.  Succeeds unless a fault has been
/// injected or the handle was closed.
pub struct SimForcer {
    config: SimConfig,
    position: f64,
    tare_offset: f64,
    profile: ControlProfile,
    scope: Scope,
    errors: Vec<String>,
    closed: bool,
    faults: HashSet<&'static str>,
    log: CallLog,
}

impl SimForcer {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            position: 0.0,
            tare_offset: 0.0,
            profile: ControlProfile::PositionHold,
            scope: Scope::default(),
            errors: Vec::new(),
            closed: false,
            faults: HashSet::new(),
            log: CallLog::default(),
        }
    }

    /// Make every call named `operation` (see [`DriverCall::name`]) fail.
    pub fn with_fault(mut self, operation: &'static str) -> Self {
        self.faults.insert(operation);
        self
    }

    /// Shared handle onto this driver's call log.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    /// Raw (untared) contact force at the current position.
    fn contact_force(&self) -> f64 {
        (self.position - self.config.surface_position).max(0.0) * self.config.stiffness
    }

    /// Record `call`, then refuse it if the handle is closed or a fault was
    /// injected for it.
    fn enter(&mut self, call: DriverCall) -> Result<(), DriverError> {
        let name = call.name();
        debug!(call = ?call, "sim driver call");
        self.log.push(call);
        if self.closed {
            return Err(DriverError::Closed);
        }
        if self.faults.contains(name) {
            let message = format!("injected fault in {name}");
            self.errors.push(message.clone());
            return Err(DriverError::Fault {
                channel: "sim".to_string(),
                code: 1,
                message,
            });
        }
        Ok(())
    }

    fn fault(&mut self, channel: &str, code: i32, message: &str) -> DriverError {
        self.errors.push(format!("{code}: {message}"));
        DriverError::Fault {
            channel: channel.to_string(),
            code,
            message: message.to_string(),
        }
    }
}

impl ForceDriver for SimForcer {
    fn tare(&mut self, channel: &str) -> Result<(), DriverError> {
        self.enter(DriverCall::Tare {
            channel: channel.to_string(),
        })?;
        self.tare_offset = self.contact_force();
        Ok(())
    }

    fn move_to(&mut self, channel: &str, position: f64) -> Result<(), DriverError> {
        self.enter(DriverCall::MoveTo {
            channel: channel.to_string(),
            position,
        })?;
        if !(0.0..=self.config.max_travel).contains(&position) {
            return Err(self.fault(channel, 2, "target position outside travel range"));
        }
        self.position = position;
        Ok(())
    }

    fn seek_surface(
        &mut self,
        channel: &str,
        touch_force: f64,
        vel_limit_mms: f64,
    ) -> Result<f64, DriverError> {
        self.enter(DriverCall::SeekSurface {
            channel: channel.to_string(),
            touch_force,
            vel_limit_mms,
        })?;
        if vel_limit_mms <= 0.0 {
            return Err(self.fault(channel, 4, "velocity limit must be positive"));
        }
        let contact = self.config.surface_position + touch_force.max(0.0) / self.config.stiffness;
        if contact > self.config.max_travel {
            return Err(self.fault(channel, 5, "surface not found within travel range"));
        }
        self.position = contact;
        Ok(contact)
    }

    fn set_control_params(
        &mut self,
        channel: &str,
        profile: ControlProfile,
    ) -> Result<(), DriverError> {
        self.enter(DriverCall::SetControlParams {
            channel: channel.to_string(),
            profile,
        })?;
        self.profile = profile;
        Ok(())
    }

    fn press_profile(
        &mut self,
        channel: &str,
        force: f64,
        timing: PressTiming,
    ) -> Result<(), DriverError> {
        self.enter(DriverCall::PressProfile {
            channel: channel.to_string(),
            force,
            timing,
        })?;
        if self.profile != ControlProfile::ForceHold {
            return Err(self.fault(channel, 3, "press requires the force-hold profile"));
        }
        if self.scope.armed {
            let rate = f64::from(self.scope.sample_rate_hz.unwrap_or(250));
            let ramp =
                |duration_ms: u32| (f64::from(duration_ms) * rate / 1000.0).round() as usize;
            let (rise, hold, fall) = (
                ramp(timing.rise_ms),
                ramp(timing.hold_ms),
                ramp(timing.fall_ms),
            );
            let needed = self
                .scope
                .samples
                .len()
                .saturating_add(rise)
                .saturating_add(hold)
                .saturating_add(fall);
            if needed > self.config.scope_capacity {
                return Err(self.fault(channel, 8, "scope buffer overflow"));
            }
            for i in 0..rise {
                self.scope.samples.push(force * (i + 1) as f64 / rise as f64);
            }
            self.scope.samples.extend(std::iter::repeat_n(force, hold));
            for i in 0..fall {
                self.scope.samples.push(force * (fall - i - 1) as f64 / fall as f64);
            }
        }
        Ok(())
    }

    fn init_sampling(&mut self, channel: &str, sample_rate_hz: u32) -> Result<(), DriverError> {
        self.enter(DriverCall::InitSampling {
            channel: channel.to_string(),
            sample_rate_hz,
        })?;
        if sample_rate_hz == 0 {
            return Err(self.fault(channel, 6, "sample rate must be positive"));
        }
        self.scope.sample_rate_hz = Some(sample_rate_hz);
        Ok(())
    }

    fn start_sampling(&mut self) -> Result<(), DriverError> {
        self.enter(DriverCall::StartSampling)?;
        if self.scope.sample_rate_hz.is_none() {
            return Err(self.fault("scope", 7, "scope not initialised"));
        }
        self.scope.armed = true;
        self.scope.samples.clear();
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f64>, DriverError> {
        self.enter(DriverCall::ReadSamples)?;
        if self.scope.sample_rate_hz.is_none() {
            return Err(self.fault("scope", 7, "scope not initialised"));
        }
        Ok(self.scope.samples.clone())
    }

    fn read_position(&mut self, channel: &str) -> Result<f64, DriverError> {
        self.enter(DriverCall::ReadPosition {
            channel: channel.to_string(),
        })?;
        Ok(self.position)
    }

    fn read_force(&mut self, channel: &str) -> Result<f64, DriverError> {
        self.enter(DriverCall::ReadForce {
            channel: channel.to_string(),
        })?;
        Ok(self.contact_force() - self.tare_offset)
    }

    fn read_errors(&mut self) -> Result<String, DriverError> {
        self.enter(DriverCall::ReadErrors)?;
        if self.errors.is_empty() {
            Ok("No errors".to_string())
        } else {
            Ok(self.errors.join("; "))
        }
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.enter(DriverCall::Close)?;
        self.closed = true;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
