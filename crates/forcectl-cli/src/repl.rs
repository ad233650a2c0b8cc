//! REPL – Read-Eval-Print Loop for the forcectl shell.
//!
//! Every line that is not a slash-command is sent verbatim to the command
//! server and the reply is printed as `Response: <text>`.
//!
//! Supported slash-commands:
//!   /help         – show the command reference
//!   /quit | /exit – leave the shell (the server is stopped with it)
//!
//! Sending `exit` stops the server, so the shell leaves after printing the
//! reply.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use forcectl_middleware::{CommandClient, decode_command};
use forcectl_types::Command;
use tracing::debug;

/// What the loop does after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Entry point for the interactive shell on stdin/stdout.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(client: &CommandClient, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = run_with(stdin.lock(), &mut stdout, client, &shutdown) {
        eprintln!("{}: {}", "Read error".red(), e);
    }
}

/// Drive the shell from any line source.
pub fn run_with<R: BufRead, W: Write>(
    mut input: R,
    out: &mut W,
    client: &CommandClient,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        write!(out, "{} ", "forcectl>".bold().cyan())?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break; // EOF
        }

        if handle_line(line.trim(), client, out)? == Flow::Quit {
            shutdown.store(true, Ordering::SeqCst);
            break;
        }
    }
    Ok(())
}

/// Handle one trimmed input line.
pub fn handle_line<W: Write>(line: &str, client: &CommandClient, out: &mut W) -> io::Result<Flow> {
    match line {
        "" => Ok(Flow::Continue),
        "/help" => {
            cmd_help(out)?;
            Ok(Flow::Continue)
        }
        "/quit" | "/exit" => {
            writeln!(out, "{}", "Goodbye.".green())?;
            Ok(Flow::Quit)
        }
        other if other.starts_with('/') => {
            writeln!(
                out,
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "/help".bold()
            )?;
            Ok(Flow::Continue)
        }
        command => send(command, client, out),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn send<W: Write>(command: &str, client: &CommandClient, out: &mut W) -> io::Result<Flow> {
    match client.send(command) {
        Ok(reply) => {
            writeln!(out, "Response: {reply}")?;
            if matches!(decode_command(command), Ok(Command::Exit)) {
                debug!("server stopped by exit command");
                return Ok(Flow::Quit);
            }
        }
        Err(e) => writeln!(out, "{} {}", "Error:".red().bold(), e)?,
    }
    Ok(Flow::Continue)
}

fn cmd_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "Server commands".bold().underline())?;
    let rows = [
        ("Connect", "report whether the controller is connected"),
        ("Disconnect", "release the controller handle"),
        ("Zero", "tare the force sensor"),
        ("Move <pos>", "tare, then move to an absolute position (mm)"),
        ("SeekSurface <max> <force>", "find the contact surface and back off 2 mm"),
        ("PressWithForce <f> <hold> <rise> <fall>", "run a press and append its trace"),
        ("SetForceControlParams <0|1>", "select position-hold or force-hold"),
        ("GetPosition", "read the current position"),
        ("GetForce", "read the current force and dump the raw trace"),
        ("GetErrors", "list controller errors"),
        ("exit", "stop the server and leave"),
    ];
    for (usage, text) in rows {
        writeln!(out, "  {:<42} – {}", usage.bold().cyan(), text)?;
    }
    writeln!(out)?;
    writeln!(out, "{}", "Shell commands".bold().underline())?;
    writeln!(out, "  {:<42} – {}", "/help".bold().cyan(), "show this list")?;
    writeln!(out, "  {:<42} – {}", "/quit  /exit".bold().cyan(), "leave the shell")?;
    writeln!(out)?;
    Ok(())
}
