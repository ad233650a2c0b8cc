//! `forcectl` – interactive shell for the force-actuator command server.
//!
//! 1. Loads `~/.forcectl/config.toml`, writing the defaults on first run.
//! 2. Starts `forcectl-server` as a child process.
//! 3. Drops the user into the REPL; each line is sent as one command.
//! 4. Stops the server on every way out, Ctrl-C included.

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use forcectl_cli::config::{self, Config};
use forcectl_cli::supervisor::ServerProcess;
use forcectl_cli::{repl, telemetry};
use forcectl_middleware::CommandClient;

fn main() -> ExitCode {
    // Logs go to stderr; default to warnings so the prompt stays clean.
    let _tracing = telemetry::init_tracing("forcectl", "warn");

    print_banner();

    let cfg = load_config();

    let addr = match cfg.server_addr() {
        Ok(addr) => addr,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Server process ────────────────────────────────────────────────────
    let server_binary = match std::env::current_exe() {
        Ok(exe) => cfg.server_binary(&exe),
        Err(e) => {
            error!(error = %e, "Cannot locate the running executable");
            return ExitCode::FAILURE;
        }
    };
    let server = match ServerProcess::spawn(&server_binary, std::iter::empty::<&str>()) {
        Ok(server) => server,
        Err(e) => {
            error!(program = %server_binary.display(), error = %e, "Failed to start server");
            println!(
                "{} {}: {}",
                "Failed to start".red().bold(),
                server_binary.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };
    println!("  Server: {} on {}", server.program().display().to_string().dimmed(), addr);

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the server …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will not stop the server");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    let client = CommandClient::new(addr).with_retry(cfg.client_max_attempts, cfg.client_backoff());
    repl::run(&client, shutdown);

    if let Err(e) = server.shutdown() {
        warn!(error = %e, "Failed to stop server process");
    }
    ExitCode::SUCCESS
}

fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            match config::save(&Config::default()) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::from_env()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::from_env()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "forcectl".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Force actuator command shell");
    println!();
}
