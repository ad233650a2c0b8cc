//! `forcectl-server` – serves force-actuator commands on the loopback port.
//!
//! Opens the force controller, connects the session (tare + scope init) and
//! blocks in the command loop until a client sends `exit` or an empty
//! payload.  Normally started by the `forcectl` shell.

use std::process::ExitCode;

use forcectl_cli::{config, telemetry};
use forcectl_hal::{ForceDriver, SimForcer, SvgPlotter};
use forcectl_kernel::ForceController;
use forcectl_middleware::{CommandServer, ExchangeJournal};
use tracing::{error, info};

fn main() -> ExitCode {
    let _tracing = telemetry::init_tracing("forcectl-server", "info");

    let cfg = config::load_or_default();

    let addr = match cfg.server_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "Invalid server address");
            return ExitCode::FAILURE;
        }
    };

    info!(device_ip = %cfg.device_ip, channel = %cfg.channel, "Opening force controller");
    let sim = cfg.sim_config();
    let mut controller = ForceController::connect(
        || Ok(Box::new(SimForcer::new(sim)) as Box<dyn ForceDriver>),
        cfg.controller_config(),
    );
    if let Some(dir) = cfg.plot_dir() {
        controller = controller.with_plotter(Box::new(SvgPlotter::new(dir)));
    }

    let mut server = match CommandServer::bind(addr) {
        Ok(server) => server,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind command server");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = &cfg.journal_path {
        server = server.with_journal(ExchangeJournal::new(path));
    }

    let reason = server.serve(&mut controller);
    info!(?reason, "Server stopped");
    ExitCode::SUCCESS
}
