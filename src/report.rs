//! Terminal rendering of job events.

use anyhow::Result;
use shrinkray_av::ProgressSample;
use shrinkray_common::BYTES_PER_MB;
use shrinkray::job::{JobEvent, JobEventPayload, JobResult};
use std::io::Write;

/// `"12.34 MB"`
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB as f64)
}

/// One status line, e.g. `"50% - Speed: 1.25 MB/s - ETA: 40s"`.
pub fn format_sample(sample: &ProgressSample) -> String {
    let speed = match sample.throughput_mb_per_sec() {
        Some(mb) => format!("{mb:.2} MB/s"),
        None => "-- MB/s".to_string(),
    };
    let eta = match sample.eta_secs {
        Some(secs) => format!("{}s", secs as u64),
        None => "--".to_string(),
    };
    format!("{}% - Speed: {} - ETA: {}", sample.percent(), speed, eta)
}

/// Writes events to stdout, either as text or one JSON object per line.
pub struct EventPrinter<W: Write> {
    out: W,
    json: bool,
    last_percent: Option<u8>,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            last_percent: None,
        }
    }

    pub fn print(&mut self, event: &JobEvent) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, event)?;
            writeln!(self.out)?;
            return Ok(());
        }

        match &event.payload {
            // Stage changes are logged; the terminal only shows progress.
            JobEventPayload::StateChanged { .. } => {}
            JobEventPayload::Progress { sample } => {
                // ffmpeg reports several times a second; one line per percent.
                let percent = sample.percent();
                if self.last_percent != Some(percent) {
                    self.last_percent = Some(percent);
                    writeln!(self.out, "{}", format_sample(sample))?;
                }
            }
            JobEventPayload::Done { result } => match result {
                JobResult::Succeeded { output } => {
                    writeln!(self.out, "Compression done.")?;
                    writeln!(self.out, "Output: {}", output.display())?;
                }
                // Reported through the command's error and exit status.
                JobResult::Failed { .. } | JobResult::Cancelled => {}
            },
        }
        self.out.flush()?;
        Ok(())
    }
}
