//! [`TraceRecorder`] – force-trace CSV sink.
//!
//! A session writes all of its traces to one CSV file, in one of two modes:
//!
//! | Mode | Trigger | File | Row format |
//! |---|---|---|---|
//! | [`append_press`][TraceRecorder::append_press] | press | appended, one `"Press point N"` section per call | two decimals, comma separator (`"12,34"`) |
//! | [`overwrite_raw`][TraceRecorder::overwrite_raw] | force read | truncated, latest batch only | two decimals, period separator (`12.34`) |
//!
//! Rows are CRLF-terminated.  Comma-decimal values are quoted by the CSV
//! writer, so the file stays valid single-column CSV.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::{Terminator, Writer, WriterBuilder};

/// Writes sampled force traces to a fixed per-session CSV path.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    path: PathBuf,
}

impl TraceRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a `label` header row followed by one comma-decimal row per
    /// sample.  Earlier sections are left untouched.
    pub fn append_press(&self, label: &str, samples: &[f64]) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv_writer(file);
        writer.write_record([label])?;
        for sample in samples {
            writer.write_record([comma_decimal(*sample)])?;
        }
        writer.flush()
    }

    /// Replace the whole file with one period-decimal row per sample.
    pub fn overwrite_raw(&self, samples: &[f64]) -> io::Result<()> {
        let mut writer = csv_writer(File::create(&self.path)?);
        for sample in samples {
            writer.write_record([format!("{sample:.2}")])?;
        }
        writer.flush()
    }
}

fn csv_writer<W: Write>(sink: W) -> Writer<W> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::CRLF)
        .from_writer(sink)
}

/// `12.346` → `12,35`
fn comma_decimal(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}
