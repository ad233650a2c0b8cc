//! `forcectl-cli` – Shell, Server Binary and Their Shared Plumbing
//!
//! Two binaries are built from this crate:
//!
//! - `forcectl` – the interactive shell.  Starts `forcectl-server` as a child
//!   process, then forwards each typed line as one command.
//! - `forcectl-server` – opens the force controller, connects the session and
//!   serves commands until `exit` or an empty payload.
//!
//! # Modules
//!
//! - [`config`] – `~/.forcectl/config.toml` with `FORCECTL_*` overrides.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.
//! - [`supervisor`] – [`ServerProcess`][supervisor::ServerProcess]: child
//!   process that is killed and reaped on drop.
//! - [`repl`] – the shell loop.

pub mod config;
pub mod repl;
pub mod supervisor;
pub mod telemetry;
