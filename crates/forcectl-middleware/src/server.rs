//! [`CommandServer`] – blocking one-connection-at-a-time command server.
//!
//! Listens on `127.0.0.1:5006` by default and services exactly one command
//! per connection:
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!       Accepting ──► Reading ──► Dispatching ──► Responding ┘
//!                        │                           │
//!                        └ empty payload ─► Stopped ◄┘ exit
//! ```
//!
//! The next connection is not accepted until the current one has been
//! answered and closed, so commands reach the [`ForceController`] strictly in
//! arrival order and never concurrently.  Failures on a single connection are
//! logged and the server moves on; only an empty payload or the `exit`
//! command end [`CommandServer::serve`].

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use forcectl_kernel::ForceController;
use forcectl_types::{Command, Exchange};
use tracing::{debug, error, info, warn};

use crate::codec::{self, INVALID_COMMAND};
use crate::journal::ExchangeJournal;

/// Default loopback address of the command server.
pub const DEFAULT_IP: &str = "127.0.0.1";

/// Default TCP port of the command server.
pub const DEFAULT_PORT: u16 = 5006;

/// Maximum size of one request; longer payloads are truncated.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Pause after a failed `accept` so a persistent error (e.g. out of file
/// descriptors) does not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Why [`CommandServer::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A client connected and sent nothing.
    EmptyPayload,
    /// A client sent `exit`.
    ExitCommand,
}

/// One step of the accept/read/dispatch/respond cycle.
enum Phase {
    Accepting,
    Reading {
        stream: TcpStream,
        peer: SocketAddr,
    },
    Dispatching {
        stream: TcpStream,
        peer: SocketAddr,
        request: String,
    },
    Responding {
        stream: TcpStream,
        peer: SocketAddr,
        request: String,
        response: String,
        shutdown: Option<ShutdownReason>,
    },
    Stopped(ShutdownReason),
}

// ---------------------------------------------------------------------------
// CommandServer
// ---------------------------------------------------------------------------

pub struct CommandServer {
    listener: TcpListener,
    journal: Option<ExchangeJournal>,
}

impl CommandServer {
    /// Bind the listening socket.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            journal: None,
        })
    }

    /// Also append every exchange to `journal` (builder-style).
    pub fn with_journal(mut self, journal: ExchangeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve commands against `controller` until shut down.  The listening
    /// socket is closed when this returns.
    pub fn serve(self, controller: &mut ForceController) -> ShutdownReason {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Server listening");
        }

        let mut phase = Phase::Accepting;
        loop {
            phase = match phase {
                Phase::Accepting => self.accept(),
                Phase::Reading { stream, peer } => Self::read(stream, peer),
                Phase::Dispatching {
                    stream,
                    peer,
                    request,
                } => Self::dispatch(controller, stream, peer, request),
                Phase::Responding {
                    stream,
                    peer,
                    request,
                    response,
                    shutdown,
                } => self.respond(stream, peer, &request, &response, shutdown),
                Phase::Stopped(reason) => {
                    info!(?reason, "Server shutting down");
                    return reason;
                }
            };
        }
    }

    fn accept(&self) -> Phase {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "Connection established");
                Phase::Reading { stream, peer }
            }
            Err(e) => {
                error!(error = %e, "accept failed");
                thread::sleep(ACCEPT_RETRY_DELAY);
                Phase::Accepting
            }
        }
    }

    fn read(mut stream: TcpStream, peer: SocketAddr) -> Phase {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        match stream.read(&mut buf) {
            Ok(0) => Phase::Stopped(ShutdownReason::EmptyPayload),
            Ok(n) => match std::str::from_utf8(&buf[..n]) {
                Ok(text) => Phase::Dispatching {
                    stream,
                    peer,
                    request: text.to_string(),
                },
                Err(e) => {
                    let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                    warn!(%peer, error = %e, "request is not valid UTF-8");
                    Phase::Responding {
                        stream,
                        peer,
                        request,
                        response: INVALID_COMMAND.to_string(),
                        shutdown: None,
                    }
                }
            },
            Err(e) => {
                warn!(%peer, error = %e, "read failed; dropping connection");
                Phase::Accepting
            }
        }
    }

    fn dispatch(
        controller: &mut ForceController,
        stream: TcpStream,
        peer: SocketAddr,
        request: String,
    ) -> Phase {
        info!(%peer, command = %request, "Received command");
        let (response, shutdown) = match codec::decode_command(&request) {
            Ok(command) => {
                let response = codec::encode_response(&controller.execute(&command));
                let shutdown = (command == Command::Exit).then_some(ShutdownReason::ExitCommand);
                (response, shutdown)
            }
            Err(e) => {
                warn!(%peer, error = %e, "malformed command");
                (INVALID_COMMAND.to_string(), None)
            }
        };
        Phase::Responding {
            stream,
            peer,
            request,
            response,
            shutdown,
        }
    }

    fn respond(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        request: &str,
        response: &str,
        shutdown: Option<ShutdownReason>,
    ) -> Phase {
        match stream.write_all(response.as_bytes()) {
            Ok(()) => info!(%peer, command = %request, response = %response, "Sent response"),
            Err(e) => warn!(%peer, command = %request, error = %e, "failed to send response"),
        }
        if let Some(journal) = &self.journal
            && let Err(e) = journal.append(&Exchange::new(peer.to_string(), request, response))
        {
            warn!(path = %journal.path().display(), error = %e, "journal append failed");
        }
        drop(stream);
        debug!(%peer, "Connection closed");
        match shutdown {
            Some(reason) => Phase::Stopped(reason),
            None => Phase::Accepting,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CommandClient;
    use forcectl_hal::{CallLog, DriverCall, ForceDriver, SimConfig, SimForcer};
    use forcectl_kernel::ControllerConfig;
    use std::net::Shutdown;
    use std::path::PathBuf;
    use std::thread::JoinHandle;

    struct Harness {
        addr: SocketAddr,
        log: CallLog,
        handle: JoinHandle<(ShutdownReason, ForceController)>,
        _dir: tempfile::TempDir,
        journal_path: PathBuf,
    }

    fn start(sim: SimForcer) -> Harness {
        let dir = tempfile::tempdir().expect("tmp dir");
        let trace_path = dir.path().join("force_data.csv");
        let journal_path = dir.path().join("exchanges.jsonl");
        let log = sim.call_log();
        let server = CommandServer::bind("127.0.0.1:0")
            .expect("bind")
            .with_journal(ExchangeJournal::new(&journal_path));
        let addr = server.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            let mut controller = ForceController::connect(
                move || Ok(Box::new(sim) as Box<dyn ForceDriver>),
                ControllerConfig::new(trace_path),
            );
            let reason = server.serve(&mut controller);
            (reason, controller)
        });
        Harness {
            addr,
            log,
            handle,
            _dir: dir,
            journal_path,
        }
    }

    fn client(addr: SocketAddr) -> CommandClient {
        CommandClient::new(addr)
    }

    fn send(addr: SocketAddr, command: &str) -> String {
        client(addr).send(command).expect("send")
    }

    #[test]
    fn connect_then_exit() {
        let h = start(SimForcer::new(SimConfig::default()));
        assert_eq!(send(h.addr, "Connect"), "ok");
        assert_eq!(send(h.addr, "exit"), "ok");
        let (reason, _controller) = h.handle.join().unwrap();
        assert_eq!(reason, ShutdownReason::ExitCommand);
        assert!(TcpStream::connect(h.addr).is_err(), "listener must be closed");
    }

    #[test]
    fn connect_reports_failed_hardware_init() {
        let h = start(SimForcer::new(SimConfig::default()).with_fault("init_sampling"));
        assert_eq!(send(h.addr, "Connect"), "Connection failed.");
        assert_eq!(send(h.addr, "exit"), "ok");
        let (_, controller) = h.handle.join().unwrap();
        assert!(!controller.is_connected());
    }

    #[test]
    fn unknown_tag_is_invalid_and_leaves_state_alone() {
        let h = start(SimForcer::new(SimConfig::default()));
        let calls_before = h.log.len();
        assert_eq!(send(h.addr, "Frobnicate"), "Invalid command");
        assert_eq!(send(h.addr, "Move"), "Invalid command");
        assert_eq!(send(h.addr, "Move north"), "Invalid command");
        assert_eq!(h.log.len(), calls_before);

        // The server keeps serving after bad input.
        assert_eq!(send(h.addr, "GetPosition"), "0.0");
        assert_eq!(send(h.addr, "exit"), "ok");
        let (_, controller) = h.handle.join().unwrap();
        assert_eq!(controller.current_column_index(), 1);
        assert_eq!(controller.cached_surface_position(), None);
    }

    #[test]
    fn empty_payload_stops_server() {
        let h = start(SimForcer::new(SimConfig::default()));
        let stream = TcpStream::connect(h.addr).expect("connect");
        stream.shutdown(Shutdown::Write).expect("half close");
        let (reason, _) = h.handle.join().unwrap();
        assert_eq!(reason, ShutdownReason::EmptyPayload);
        assert!(TcpStream::connect(h.addr).is_err(), "listener must be closed");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let h = start(SimForcer::new(SimConfig::default()));
        let mut stream = TcpStream::connect(h.addr).expect("connect");
        stream.write_all(&[0xff, 0xfe, 0x00]).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "Invalid command");
        assert_eq!(send(h.addr, "exit"), "ok");
        h.handle.join().unwrap();
    }

    #[test]
    fn seek_surface_end_to_end() {
        let h = start(SimForcer::new(SimConfig::default()));
        h.log.clear();
        let reply = send(h.addr, "SeekSurface 10.0 5.0");
        let surface: f64 = reply.parse().expect("numeric surface position");
        let calls = h.log.calls();
        assert_eq!(
            calls[1],
            DriverCall::SeekSurface {
                channel: "F1".into(),
                touch_force: 510.0,
                vel_limit_mms: 4.0,
            }
        );
        assert_eq!(
            calls[2],
            DriverCall::MoveTo {
                channel: "F1".into(),
                position: surface - 2.0,
            }
        );
        send(h.addr, "exit");
        h.handle.join().unwrap();
    }

    #[test]
    fn press_and_force_read_end_to_end() {
        let h = start(SimForcer::new(SimConfig::default()));
        assert_eq!(send(h.addr, "PressWithForce 1.0 20 8 8"), "ok");
        assert_eq!(send(h.addr, "SetForceControlParams 2"), "Config number out of range");
        assert_eq!(send(h.addr, "PressWithForce 2.0 20 8 8"), "ok");
        assert_eq!(send(h.addr, "GetErrors"), "No errors");
        send(h.addr, "exit");
        let (_, controller) = h.handle.join().unwrap();
        let text = std::fs::read_to_string(controller.trace_path()).unwrap();
        let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("Press point")).collect();
        assert_eq!(headers, vec!["Press point 1", "Press point 2"]);
    }

    #[test]
    fn oversized_profile_index_is_out_of_range() {
        let h = start(SimForcer::new(SimConfig::default()));
        assert_eq!(
            send(h.addr, "SetForceControlParams 99999999999999999999"),
            "Config number out of range"
        );
        assert_eq!(
            send(h.addr, "SetForceControlParams -99999999999999999999"),
            "Config number out of range"
        );
        send(h.addr, "exit");
        h.handle.join().unwrap();
    }

    #[test]
    fn oversized_press_window_fails_and_server_keeps_serving() {
        let h = start(SimForcer::new(SimConfig::default()));
        let reply = send(h.addr, "PressWithForce 1 4294967295 0 0");
        assert!(reply.contains("scope buffer overflow"), "{reply}");
        assert_eq!(send(h.addr, "PressWithForce 1.0 20 8 8"), "ok");
        assert_eq!(send(h.addr, "exit"), "ok");
        let (reason, controller) = h.handle.join().unwrap();
        assert_eq!(reason, ShutdownReason::ExitCommand);
        assert_eq!(controller.current_column_index(), 2);
    }

    #[test]
    fn every_exchange_is_journaled() {
        let h = start(SimForcer::new(SimConfig::default()));
        send(h.addr, "Zero");
        send(h.addr, "Frobnicate");
        send(h.addr, "exit");
        h.handle.join().unwrap();
        let raw = std::fs::read_to_string(&h.journal_path).unwrap();
        let exchanges: Vec<Exchange> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let pairs: Vec<(&str, &str)> = exchanges
            .iter()
            .map(|e| (e.command.as_str(), e.response.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Zero", "ok"), ("Frobnicate", "Invalid command"), ("exit", "ok")]
        );
    }
}
