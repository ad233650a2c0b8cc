//! Generic `ForceDriver` trait for force-controlled linear actuators.
//!
//! The controller only ever talks to this trait, so a vendor driver, a
//! simulator or a test double can be plugged in without touching the
//! command protocol.  Every call is synchronous and may block for as long as
//! the hardware needs (a press profile blocks for its full rise/hold/fall
//! duration).

use forcectl_types::{ControlProfile, DriverError, PressTiming};

/// A force-controlled actuator addressed by named channels (e.g. `"F1"`).
pub trait ForceDriver: Send {
    /// Rebase the force sensor so the current contact state reads zero.
    fn tare(&mut self, channel: &str) -> Result<(), DriverError>;

    /// Command an absolute move to `position` (mm).
    fn move_to(&mut self, channel: &str, position: f64) -> Result<(), DriverError>;

    /// Advance until `touch_force` (driver units) is detected, never faster
    /// than `vel_limit_mms`, and return the contact position.
    fn seek_surface(
        &mut self,
        channel: &str,
        touch_force: f64,
        vel_limit_mms: f64,
    ) -> Result<f64, DriverError>;

    /// Select the control loop the actuator runs under.
    fn set_control_params(
        &mut self,
        channel: &str,
        profile: ControlProfile,
    ) -> Result<(), DriverError>;

    /// Run a timed press: rise to `force`, hold, fall back.
    fn press_profile(
        &mut self,
        channel: &str,
        force: f64,
        timing: PressTiming,
    ) -> Result<(), DriverError>;

    /// Configure the scope to sample `channel` at `sample_rate_hz`.
    fn init_sampling(&mut self, channel: &str, sample_rate_hz: u32) -> Result<(), DriverError>;

    /// Start a new sampling window, discarding the previous batch.
    fn start_sampling(&mut self) -> Result<(), DriverError>;

    /// Return the samples captured in the current window.
    fn read_samples(&mut self) -> Result<Vec<f64>, DriverError>;

    fn read_position(&mut self, channel: &str) -> Result<f64, DriverError>;

    fn read_force(&mut self, channel: &str) -> Result<f64, DriverError>;

    /// The driver's current error listing, formatted by the driver.
    fn read_errors(&mut self) -> Result<String, DriverError>;

    /// Release the hardware handle.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] if the handle was already released.
    fn close(&mut self) -> Result<(), DriverError>;
}
