//! [`ForceController`] – the actuator session state machine.
//!
//! The controller owns the one driver handle of the process and turns each
//! [`Command`] into a fixed sequence of driver calls:
//!
//! | Command | Driver sequence |
//! |---|---|
//! | `Connect` | none (status query) |
//! | `Disconnect` | `close` |
//! | `Zero` | `tare` |
//! | `Move p` | `tare`, `move_to(p)` |
//! | `SeekSurface m f` | `set_control_params(0)`, `seek_surface(f × 102, 4.0)`, `move_to(found − 2.0)` |
//! | `PressWithForce f t r d` | `start_sampling`, `set_control_params(1)`, `press_profile(f × 102, …)`, `read_samples` |
//! | `SetForceControlParams n` | `set_control_params(n)` when `n ∈ {0, 1}` |
//! | `GetPosition` | `read_position` |
//! | `GetForce` | `read_force`, `read_samples` |
//! | `GetErrors` | `read_errors` |
//!
//! Driver failures are never retried here; they become the command's
//! [`Response::Failure`] text.
//!
//! # Example
//!
//! ```
//! use forcectl_hal::{SimConfig, SimForcer};
//! use forcectl_kernel::{ControllerConfig, ForceController};
//! use forcectl_types::{Command, Response};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = ControllerConfig::new(dir.path().join("force_data.csv"));
//! let mut controller = ForceController::connect(
//!     || Ok(Box::new(SimForcer::new(SimConfig::default())) as _),
//!     config,
//! );
//!
//! assert_eq!(controller.execute(&Command::Connect), Response::Ok);
//! assert_eq!(controller.execute(&Command::Move { position: 3.0 }), Response::Ok);
//! ```

use std::path::PathBuf;

use forcectl_hal::{ForceDriver, NullPlotter, TracePlotter, TraceRecorder};
use forcectl_types::{Command, ControlProfile, DriverError, ForceError, PressTiming, Response};
use tracing::{debug, error, info, warn};

/// Sensor calibration factor applied to every commanded force.
pub const FORCE_SCALE: f64 = 102.0;

/// Velocity limit (mm/s) for every surface seek.
pub const SEEK_VELOCITY_LIMIT: f64 = 4.0;

/// Distance (mm) the actuator backs off from a found surface.
pub const SURFACE_PULLBACK: f64 = 2.0;

/// Unscaled touch force used by [`ForceController::auto_seek_surface`].
pub const AUTO_SEEK_TOUCH_FORCE: f64 = 5.0;

/// Response text of `Connect` when the startup connection failed.
pub const CONNECTION_FAILED: &str = "Connection failed.";

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Session-scoped settings carried by a [`ForceController`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Driver channel every call addresses, e.g. `"F1"`.
    pub channel: String,
    /// Scope sample rate configured at startup.
    pub sample_rate_hz: u32,
    /// CSV file receiving press and force-read traces.
    pub trace_path: PathBuf,
}

impl ControllerConfig {
    /// Defaults (`"F1"`, 250 Hz) with the given trace file.
    pub fn new(trace_path: impl Into<PathBuf>) -> Self {
        Self {
            channel: "F1".to_string(),
            sample_rate_hz: 250,
            trace_path: trace_path.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ForceController
// ────────────────────────────────────────────────────────────────────────────

/// One live actuator session.
///
/// Single-owner, single-threaded: every method takes `&mut self`, so at most
/// one command touches the driver at a time.
pub struct ForceController {
    /// `None` only when opening the driver failed.
    driver: Option<Box<dyn ForceDriver>>,
    connected: bool,
    current_column_index: u32,
    cached_surface_position: Option<f64>,
    channel: String,
    trace: TraceRecorder,
    plotter: Box<dyn TracePlotter>,
}

impl ForceController {
    /// Open the driver with `open`, tare the sensor and initialise the scope.
    ///
    /// Never fails: any error along the way is logged and leaves the session
    /// with `is_connected() == false`.  There is no later reconnect path.
    pub fn connect<F>(open: F, config: ControllerConfig) -> Self
    where
        F: FnOnce() -> Result<Box<dyn ForceDriver>, DriverError>,
    {
        let ControllerConfig {
            channel,
            sample_rate_hz,
            trace_path,
        } = config;

        let mut controller = Self {
            driver: None,
            connected: false,
            current_column_index: 1,
            cached_surface_position: None,
            channel,
            trace: TraceRecorder::new(trace_path),
            plotter: Box::new(NullPlotter),
        };

        let startup = open().and_then(|driver| {
            let driver = controller.driver.insert(driver);
            driver.tare(&controller.channel)?;
            driver.init_sampling(&controller.channel, sample_rate_hz)
        });
        match startup {
            Ok(()) => {
                controller.connected = true;
                info!(
                    channel = %controller.channel,
                    sample_rate_hz,
                    "Force control connection established."
                );
            }
            Err(e) => error!(error = %e, "Force control connection failed"),
        }
        controller
    }

    /// Replace the plot sink (builder-style).  Defaults to [`NullPlotter`].
    pub fn with_plotter(mut self, plotter: Box<dyn TracePlotter>) -> Self {
        self.plotter = plotter;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Label number the next press section will receive.
    pub fn current_column_index(&self) -> u32 {
        self.current_column_index
    }

    pub fn cached_surface_position(&self) -> Option<f64> {
        self.cached_surface_position
    }

    pub fn trace_path(&self) -> &std::path::Path {
        self.trace.path()
    }

    /// Execute one command.  Failures are folded into
    /// [`Response::Failure`]; this never panics on driver errors.
    pub fn execute(&mut self, command: &Command) -> Response {
        let result = match *command {
            Command::Connect => Ok(self.connect_status()),
            Command::Disconnect => self.disconnect().map(|()| Response::Ok),
            Command::Zero => self.zero().map(|()| Response::Ok),
            Command::Move { position } => self.move_to(position).map(|()| Response::Ok),
            Command::SeekSurface {
                max_position,
                force,
            } => self.seek_surface(max_position, force).map(Response::Value),
            Command::PressWithForce { force, timing } => {
                self.press_with_force(force, timing).map(|()| Response::Ok)
            }
            Command::SetForceControlParams { config } => {
                self.set_control_params(config).map(|()| Response::Ok)
            }
            Command::GetPosition => self.get_position().map(Response::Value),
            Command::GetForce => self.get_force().map(Response::Value),
            Command::GetErrors => self.get_errors().map(Response::Text),
            Command::Exit => Ok(Response::Ok),
        };
        result.unwrap_or_else(|e| {
            warn!(command = command.tag(), error = %e, "command failed");
            Response::from(e)
        })
    }

    fn driver(&mut self) -> Result<&mut (dyn ForceDriver + 'static), DriverError> {
        self.driver.as_deref_mut().ok_or(DriverError::NotConnected)
    }

    /// Report the startup connection state.  Makes no driver call.
    pub fn connect_status(&self) -> Response {
        if self.connected {
            info!("Already connected to the force control.");
            Response::Ok
        } else {
            Response::Text(CONNECTION_FAILED.to_string())
        }
    }

    /// Release the driver handle.
    ///
    /// The handle stays owned and `connected` is left as is, so a second call
    /// reaches the driver again and surfaces its already-released error.
    pub fn disconnect(&mut self) -> Result<(), ForceError> {
        self.driver()?.close()?;
        info!("Force control handle released");
        Ok(())
    }

    /// Re-tare the force sensor.
    pub fn zero(&mut self) -> Result<(), ForceError> {
        let channel = self.channel.clone();
        self.driver()?.tare(&channel)?;
        Ok(())
    }

    /// Tare, then move to the absolute `position`.
    pub fn move_to(&mut self, position: f64) -> Result<(), ForceError> {
        let channel = self.channel.clone();
        let driver = self.driver()?;
        driver.tare(&channel)?;
        driver.move_to(&channel, position)?;
        Ok(())
    }

    /// Seek the contact surface with `force` (scaled by [`FORCE_SCALE`]),
    /// back off by [`SURFACE_PULLBACK`] and return the found position.
    ///
    /// `max_position` does not bound the seek.
    pub fn seek_surface(&mut self, max_position: f64, force: f64) -> Result<f64, ForceError> {
        debug!(max_position, "seek bound accepted but not applied");
        let channel = self.channel.clone();
        let driver = self.driver()?;
        driver.set_control_params(&channel, ControlProfile::PositionHold)?;
        let surface = driver.seek_surface(&channel, force * FORCE_SCALE, SEEK_VELOCITY_LIMIT)?;
        driver.move_to(&channel, surface - SURFACE_PULLBACK)?;
        info!(surface, "surface found");
        Ok(surface)
    }

    /// Seek the surface once with [`AUTO_SEEK_TOUCH_FORCE`] and cache it;
    /// later calls reuse the cached position.  Either way the actuator ends
    /// [`SURFACE_PULLBACK`] short of the surface.
    pub fn auto_seek_surface(&mut self) -> Result<f64, ForceError> {
        let channel = self.channel.clone();
        let cached = self.cached_surface_position;
        let driver = self.driver()?;
        let surface = match cached {
            Some(surface) => surface,
            None => driver.seek_surface(&channel, AUTO_SEEK_TOUCH_FORCE, SEEK_VELOCITY_LIMIT)?,
        };
        driver.move_to(&channel, surface - SURFACE_PULLBACK)?;
        self.cached_surface_position = Some(surface);
        Ok(surface)
    }

    /// Run a press profile, append its trace as a new `"Press point N"`
    /// section and hand it to the plotter.
    pub fn press_with_force(&mut self, force: f64, timing: PressTiming) -> Result<(), ForceError> {
        debug!("press_with_force called");
        let channel = self.channel.clone();
        let scaled = force * FORCE_SCALE;
        let driver = self.driver()?;
        driver.start_sampling()?;
        driver.set_control_params(&channel, ControlProfile::ForceHold)?;
        driver.press_profile(&channel, scaled, timing)?;
        let samples = driver.read_samples()?;

        let label = format!("Press point {}", self.current_column_index);
        self.trace.append_press(&label, &samples)?;
        self.current_column_index += 1;
        info!(%label, samples = samples.len(), "press trace recorded");

        match self.plotter.plot(&samples, &label, scaled) {
            Ok(Some(path)) => debug!(path = %path.display(), "press plot written"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, %label, "press plot failed"),
        }
        Ok(())
    }

    /// Select control profile `config` (0 or 1).
    ///
    /// # Errors
    ///
    /// [`ForceError::OutOfRangeArgument`] for any other value; the driver is
    /// not called in that case.
    pub fn set_control_params(&mut self, config: i64) -> Result<(), ForceError> {
        let profile = ControlProfile::try_from(config)?;
        let channel = self.channel.clone();
        self.driver()?.set_control_params(&channel, profile)?;
        Ok(())
    }

    pub fn get_position(&mut self) -> Result<f64, ForceError> {
        debug!("get_position called");
        let channel = self.channel.clone();
        Ok(self.driver()?.read_position(&channel)?)
    }

    /// Read the current force and overwrite the trace file with the latest
    /// sample batch.
    pub fn get_force(&mut self) -> Result<f64, ForceError> {
        debug!("get_force called");
        let channel = self.channel.clone();
        let driver = self.driver()?;
        let force = driver.read_force(&channel)?;
        let samples = driver.read_samples()?;
        self.trace.overwrite_raw(&samples)?;
        Ok(force)
    }

    pub fn get_errors(&mut self) -> Result<String, ForceError> {
        Ok(self.driver()?.read_errors()?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use forcectl_hal::{CallLog, DriverCall, SimConfig, SimForcer};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn session_with(sim: SimForcer) -> (TempDir, CallLog, ForceController) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let log = sim.call_log();
        let config = ControllerConfig::new(dir.path().join("force_data.csv"));
        let controller =
            ForceController::connect(move || Ok(Box::new(sim) as Box<dyn ForceDriver>), config);
        (dir, log, controller)
    }

    fn session() -> (TempDir, CallLog, ForceController) {
        session_with(SimForcer::new(SimConfig::default()))
    }

    fn press(force: f64) -> Command {
        Command::PressWithForce {
            force,
            timing: PressTiming { hold_ms: 20, rise_ms: 8, fall_ms: 8 },
        }
    }

    fn trace_len(controller: &ForceController) -> u64 {
        std::fs::metadata(controller.trace_path()).map(|m| m.len()).unwrap_or(0)
    }

    fn trace_text(controller: &ForceController) -> String {
        std::fs::read_to_string(controller.trace_path()).unwrap_or_default()
    }

    #[test]
    fn startup_tares_and_initialises_scope() {
        let (_dir, log, controller) = session();
        assert!(controller.is_connected());
        assert_eq!(controller.current_column_index(), 1);
        assert_eq!(log.names(), vec!["tare", "init_sampling"]);
        assert_eq!(
            log.calls()[1],
            DriverCall::InitSampling { channel: "F1".into(), sample_rate_hz: 250 }
        );
    }

    #[test]
    fn connect_is_a_status_query() {
        let (_dir, log, mut controller) = session();
        log.clear();
        assert_eq!(controller.execute(&Command::Connect), Response::Ok);
        assert!(log.is_empty());
    }

    #[test]
    fn failed_startup_tare_reports_connection_failed() {
        let (_dir, log, mut controller) =
            session_with(SimForcer::new(SimConfig::default()).with_fault("tare"));
        assert!(!controller.is_connected());
        log.clear();
        assert_eq!(
            controller.execute(&Command::Connect),
            Response::Text(CONNECTION_FAILED.to_string())
        );
        // A second Connect does not try again.
        assert_eq!(
            controller.execute(&Command::Connect),
            Response::Text(CONNECTION_FAILED.to_string())
        );
        assert!(log.is_empty());
    }

    #[test]
    fn failed_driver_open_leaves_no_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = ForceController::connect(
            || Err(DriverError::Unavailable("no route to 192.168.250.254".into())),
            ControllerConfig::new(dir.path().join("t.csv")),
        );
        assert!(!controller.is_connected());
        assert_eq!(
            controller.execute(&Command::Zero),
            Response::Failure("Force control not connected".into())
        );
    }

    #[test]
    fn every_move_is_preceded_by_a_tare() {
        let (_dir, log, mut controller) = session();
        for p in [0.0, 1.5, 7.25, 30.0] {
            log.clear();
            assert_eq!(controller.execute(&Command::Move { position: p }), Response::Ok);
            assert_eq!(
                log.calls(),
                vec![
                    DriverCall::Tare { channel: "F1".into() },
                    DriverCall::MoveTo { channel: "F1".into(), position: p },
                ]
            );
        }
    }

    #[test]
    fn failed_tare_prevents_move() {
        let (_dir, log, mut controller) =
            session_with(SimForcer::new(SimConfig::default()).with_fault("tare"));
        log.clear();
        let response = controller.execute(&Command::Move { position: 2.0 });
        assert!(matches!(
            response,
            Response::Failure(ref msg) if msg.contains("injected fault in tare")
        ));
        assert_eq!(log.names(), vec!["tare"]);
    }

    #[test]
    fn zero_only_tares() {
        let (_dir, log, mut controller) = session();
        log.clear();
        assert_eq!(controller.execute(&Command::Zero), Response::Ok);
        assert_eq!(log.names(), vec!["tare"]);
    }

    #[test]
    fn seek_surface_scales_force_and_pulls_back() {
        let (_dir, log, mut controller) = session();
        log.clear();
        let response = controller.execute(&Command::SeekSurface { max_position: 10.0, force: 5.0 });
        let calls = log.calls();
        assert_eq!(
            calls[0],
            DriverCall::SetControlParams {
                channel: "F1".into(),
                profile: ControlProfile::PositionHold
            }
        );
        assert_eq!(
            calls[1],
            DriverCall::SeekSurface { channel: "F1".into(), touch_force: 510.0, vel_limit_mms: 4.0 }
        );
        let surface = match response {
            Response::Value(v) => v,
            other => panic!("expected surface position, got {other:?}"),
        };
        assert_eq!(calls[2], DriverCall::MoveTo { channel: "F1".into(), position: surface - 2.0 });
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn seek_surface_ignores_max_position() {
        let (_dir, _log, mut controller) = session();
        // Surface sits at 12.5 mm, beyond the requested bound.
        let response = controller.execute(&Command::SeekSurface { max_position: 1.0, force: 1.0 });
        assert!(matches!(response, Response::Value(v) if v > 1.0));
    }

    #[test]
    fn auto_seek_caches_surface() {
        let (_dir, log, mut controller) = session();
        assert_eq!(controller.cached_surface_position(), None);
        log.clear();
        let first = controller.auto_seek_surface().unwrap();
        assert_eq!(log.names(), vec!["seek_surface", "move_to"]);
        assert_eq!(
            log.calls()[0],
            DriverCall::SeekSurface { channel: "F1".into(), touch_force: 5.0, vel_limit_mms: 4.0 }
        );
        assert_eq!(controller.cached_surface_position(), Some(first));

        log.clear();
        let second = controller.auto_seek_surface().unwrap();
        assert_eq!(second, first);
        assert_eq!(
            log.calls(),
            vec![DriverCall::MoveTo {
                channel: "F1".into(),
                position: first - 2.0
            }]
        );
    }

    #[test]
    fn press_sequence_and_trace_section() {
        let (_dir, log, mut controller) = session();
        log.clear();
        assert_eq!(controller.execute(&press(2.0)), Response::Ok);
        assert_eq!(
            log.names(),
            vec!["start_sampling", "set_control_params", "press_profile", "read_samples"]
        );
        assert_eq!(
            log.calls()[2],
            DriverCall::PressProfile {
                channel: "F1".into(),
                force: 204.0,
                timing: PressTiming { hold_ms: 20, rise_ms: 8, fall_ms: 8 },
            }
        );
        let text = trace_text(&controller);
        assert!(text.starts_with("Press point 1\r\n"));
        assert!(text.contains("\"204,00\"\r\n"));
        assert_eq!(controller.current_column_index(), 2);
    }

    #[test]
    fn press_sections_are_numbered_across_other_commands() {
        let (_dir, _log, mut controller) = session();
        let k = 4;
        for i in 0..k {
            assert_eq!(controller.execute(&press(1.0 + i as f64)), Response::Ok);
            controller.execute(&Command::GetPosition);
            controller.execute(&Command::Zero);
            controller.execute(&Command::SetForceControlParams { config: 9 });
        }
        let text = trace_text(&controller);
        let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("Press point")).collect();
        let expected: Vec<String> = (1..=k).map(|n| format!("Press point {n}")).collect();
        assert_eq!(headers, expected);
        assert_eq!(controller.current_column_index(), k + 1);
    }

    #[test]
    fn failed_press_does_not_advance_column() {
        let (_dir, _log, mut controller) =
            session_with(SimForcer::new(SimConfig::default()).with_fault("press_profile"));
        assert!(matches!(controller.execute(&press(1.0)), Response::Failure(_)));
        assert_eq!(controller.current_column_index(), 1);
        assert_eq!(trace_len(&controller), 0);
    }

    #[test]
    fn get_force_overwrites_and_press_appends() {
        let (_dir, _log, mut controller) = session();
        controller.execute(&press(1.0));
        controller.execute(&press(1.0));
        let after_presses = trace_len(&controller);
        assert!(after_presses > 0);

        let response = controller.execute(&Command::GetForce);
        assert!(matches!(response, Response::Value(_)));
        let after_force = trace_len(&controller);
        let text = trace_text(&controller);
        assert!(after_force < after_presses);
        assert!(!text.contains("Press point"));
        assert!(text.lines().all(|l| !l.contains(',')));
        assert!(text.contains("102.00\r\n"));

        controller.execute(&press(1.0));
        let after_third = trace_len(&controller);
        assert!(after_third > after_force);
        let text = trace_text(&controller);
        assert!(text.contains("Press point 3"));
        assert!(text.starts_with("51.00\r\n"));
    }

    #[test]
    fn set_control_params_range_check() {
        let (_dir, log, mut controller) = session();
        for n in [0, 1] {
            log.clear();
            assert_eq!(
                controller.execute(&Command::SetForceControlParams { config: n }),
                Response::Ok
            );
            assert_eq!(log.names(), vec!["set_control_params"]);
        }
        for n in [-1, 2, 3, 100, i64::MAX] {
            log.clear();
            assert_eq!(
                controller.execute(&Command::SetForceControlParams { config: n }),
                Response::Failure("Config number out of range".into())
            );
            assert!(log.is_empty());
        }
    }

    #[test]
    fn readings_and_error_listing_pass_through() {
        let (_dir, _log, mut controller) = session();
        controller.execute(&Command::Move { position: 3.0 });
        assert_eq!(controller.execute(&Command::GetPosition), Response::Value(3.0));
        assert_eq!(controller.execute(&Command::GetErrors), Response::Text("No errors".into()));
    }

    #[test]
    fn second_disconnect_surfaces_released_handle() {
        let (_dir, _log, mut controller) = session();
        assert_eq!(controller.execute(&Command::Disconnect), Response::Ok);
        assert!(controller.is_connected());
        assert_eq!(
            controller.execute(&Command::Disconnect),
            Response::Failure("Force control handle already released".into())
        );
    }

    struct RecordingPlotter(Arc<Mutex<Vec<String>>>);

    impl TracePlotter for RecordingPlotter {
        fn plot(
            &self,
            _samples: &[f64],
            label: &str,
            _force: f64,
        ) -> std::io::Result<Option<PathBuf>> {
            self.0.lock().unwrap().push(label.to_string());
            Err(std::io::Error::other("disk full"))
        }
    }

    #[test]
    fn plot_failure_does_not_affect_response() {
        let (_dir, _log, controller) = session();
        let labels = Arc::new(Mutex::new(Vec::new()));
        let mut controller = controller.with_plotter(Box::new(RecordingPlotter(labels.clone())));
        assert_eq!(controller.execute(&press(1.0)), Response::Ok);
        assert_eq!(*labels.lock().unwrap(), vec!["Press point 1".to_string()]);
        assert_eq!(controller.current_column_index(), 2);
    }
}
