//! `forcectl-middleware` – Command Protocol Plumbing
//!
//! Carries plain-text commands between a client shell and the
//! [`ForceController`][forcectl_kernel::ForceController], one command per TCP
//! connection.
//!
//! # Modules
//!
//! - [`codec`] – [`decode_command`][codec::decode_command] /
//!   [`encode_response`][codec::encode_response]: the tag/arity table of the
//!   wire protocol.  Malformed input becomes `"Invalid command"`.
//! - [`server`] – [`CommandServer`][server::CommandServer]: blocking
//!   accept → read → dispatch → respond loop, stopped by `exit` or an empty
//!   payload.
//! - [`client`] – [`CommandClient`][client::CommandClient]: fresh connection
//!   per command with bounded retry while the server starts up.
//! - [`journal`] – [`ExchangeJournal`][journal::ExchangeJournal]: optional
//!   JSON-lines record of every served exchange.

pub mod client;
pub mod codec;
pub mod journal;
pub mod server;

pub use client::{ClientError, CommandClient};
pub use codec::{INVALID_COMMAND, decode_command, encode_response};
pub use journal::ExchangeJournal;
pub use server::{CommandServer, DEFAULT_IP, DEFAULT_PORT, ShutdownReason};
