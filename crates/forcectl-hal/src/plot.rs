//! Plot sinks for press traces.
//!
//! Plotting is fire-and-forget from the controller's point of view: a failed
//! plot is logged and never changes a command's response.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

/// Renders one press trace somewhere.
pub trait TracePlotter: Send {
    /// Plot `samples` under `label`; `commanded_force` is drawn as a
    /// reference line.  Returns the path written, if any.
    fn plot(
        &self,
        samples: &[f64],
        label: &str,
        commanded_force: f64,
    ) -> io::Result<Option<PathBuf>>;
}

/// Discards every trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlotter;

impl TracePlotter for NullPlotter {
    fn plot(
        &self,
        _samples: &[f64],
        _label: &str,
        _commanded_force: f64,
    ) -> io::Result<Option<PathBuf>> {
        Ok(None)
    }
}

const SIZE: (u32, u32) = (800, 400);

/// Writes one SVG line chart per press into `dir`
/// (`"Press point 3"` → `dir/Press_point_3.svg`).
#[derive(Debug, Clone)]
pub struct SvgPlotter {
    dir: PathBuf,
    /// Seconds between consecutive samples.
    sample_period: f64,
    /// Lower bound of the force axis.
    min_force: f64,
}

impl SvgPlotter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sample_period: 0.002,
            min_force: -10.0,
        }
    }

    /// Override the time between samples (builder-style).
    pub fn with_sample_period(mut self, seconds: f64) -> Self {
        self.sample_period = seconds;
        self
    }

    /// Draw the trace with a dashed line at the commanded force.  The force
    /// axis never starts above `min_force`.
    fn draw(
        &self,
        path: &Path,
        samples: &[f64],
        label: &str,
        commanded_force: f64,
    ) -> Result<(), DrawingAreaErrorKind<io::Error>> {
        let lo = samples.iter().copied().fold(self.min_force, f64::min);
        let hi = samples
            .iter()
            .copied()
            .fold(commanded_force.max(lo + 1.0), f64::max);
        let span = (samples.len().max(2) - 1) as f64 * self.sample_period;
        let duration = if span > 0.0 { span } else { 1.0 };

        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{label} (target {commanded_force:.1})"),
                ("sans-serif", 20),
            )
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..duration, lo..hi)?;

        chart
            .configure_mesh()
            .x_desc("Time (s)")
            .y_desc("Force")
            .draw()?;

        chart.draw_series(DashedLineSeries::new(
            vec![(0.0, commanded_force), (duration, commanded_force)],
            6,
            4,
            BLACK.mix(0.5).stroke_width(1),
        ))?;

        chart.draw_series(LineSeries::new(
            samples
                .iter()
                .enumerate()
                .map(|(i, force)| (i as f64 * self.sample_period, *force)),
            &BLUE,
        ))?;

        root.present()?;
        Ok(())
    }
}

impl TracePlotter for SvgPlotter {
    fn plot(
        &self,
        samples: &[f64],
        label: &str,
        commanded_force: f64,
    ) -> io::Result<Option<PathBuf>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.svg", label.replace(' ', "_")));
        self.draw(&path, samples, label, commanded_force)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Some(path))
    }
}
