//! [`CommandClient`] – one-shot command sender with connect retry.
//!
//! Every [`send`][CommandClient::send] opens a fresh connection, writes one
//! command and reads the reply until the server closes the connection.
//!
//! # Retry policy
//!
//! Only a refused connection is retried, since the server may still be
//! starting.  Between attempts the client sleeps for the configured backoff;
//! it never sleeps after the final attempt.  Any other failure is returned
//! immediately.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

/// Connect attempts per command.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between refused connect attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Errors returned by [`CommandClient::send`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to {addr} after {attempts} attempts")]
    ConnectionUnavailable { addr: SocketAddr, attempts: u32 },

    #[error("Error while sending command: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct CommandClient {
    addr: SocketAddr,
    max_attempts: u32,
    backoff: Duration,
}

impl CommandClient {
    /// Client for `addr` with the default retry policy (3 attempts, 1 s).
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Override the retry policy (builder-style).  `max_attempts` is clamped
    /// to at least one.
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Deliver `command` and return the server's literal reply.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConnectionUnavailable`] – every attempt was refused;
    ///   nothing was sent.
    /// - [`ClientError::Io`] – any other connect, send or receive failure.
    pub fn send(&self, command: &str) -> Result<String, ClientError> {
        let mut stream = self.connect()?;
        let reply = Self::exchange(&mut stream, command).inspect_err(|e| {
            error!(command, error = %e, "Error while sending command");
        })?;
        debug!(command, reply = %reply, "command delivered");
        Ok(reply)
    }

    fn connect(&self) -> Result<TcpStream, ClientError> {
        for attempt in 1..=self.max_attempts {
            match TcpStream::connect(self.addr) {
                Ok(stream) => return Ok(stream),
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    warn!(addr = %self.addr, attempt, "Connection refused");
                    if attempt < self.max_attempts {
                        thread::sleep(self.backoff);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        error!(addr = %self.addr, attempts = self.max_attempts, "Failed to connect; giving up");
        Err(ClientError::ConnectionUnavailable {
            addr: self.addr,
            attempts: self.max_attempts,
        })
    }

    fn exchange(stream: &mut TcpStream, command: &str) -> io::Result<String> {
        stream.write_all(command.as_bytes())?;
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}
