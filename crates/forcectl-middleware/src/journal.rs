//! [`ExchangeJournal`] – append-only JSON-lines record of served exchanges.
//!
//! Each line is one serialized [`Exchange`]:
//!
//! ```text
//! {"id":"…","timestamp":"2026-10-19T09:12:44Z","peer":"127.0.0.1:53122","command":"Zero","response":"ok"}
//! ```

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use forcectl_types::Exchange;

#[derive(Debug, Clone)]
pub struct ExchangeJournal {
    path: PathBuf,
}

impl ExchangeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `exchange` as one JSON line.
    pub fn append(&self, exchange: &Exchange) -> io::Result<()> {
        let line = serde_json::to_string(exchange).map_err(io::Error::other)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}
