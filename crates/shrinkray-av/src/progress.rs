//! Turns ffmpeg status lines into progress samples.
//!
//! ffmpeg reports how much *source* time it has encoded
//! (`... time=00:01:02.50 bitrate=...`). Combined with the probed duration
//! and the planned bitrate this gives a completion fraction, an estimated
//! throughput and an ETA.
//!
//! The throughput figure is an estimate: it assumes the encoder writes
//! exactly `bitrate / 8` bytes per second of source, and does not look at
//! the bytes actually on disk.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Marker preceding the encoded-time field in a status line.
pub const TIME_MARKER: &str = "time=";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One observation of encode progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Source time encoded so far, in seconds.
    pub elapsed_secs: f64,
    /// Completion in `0.0..=1.0`. Never decreases within one job.
    pub fraction: f64,
    /// Wall-clock seconds since the encode started.
    pub wall_secs: f64,
    /// Estimated output bytes written per wall-clock second.
    pub throughput_bytes_per_sec: Option<f64>,
    /// Estimated seconds until completion.
    pub eta_secs: Option<f64>,
}

impl ProgressSample {
    /// Whole percent complete, rounded down.
    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).floor().clamp(0.0, 100.0) as u8
    }

    /// Throughput in MB/s, if known.
    pub fn throughput_mb_per_sec(&self) -> Option<f64> {
        self.throughput_bytes_per_sec.map(|b| b / BYTES_PER_MB)
    }
}

/// Extract the encoded time, in seconds, from a status line.
///
/// The token after the first [`TIME_MARKER`] up to the next whitespace must
/// be `hours:minutes:seconds`, with seconds optionally fractional. Anything
/// else (`time=N/A`, truncated stamps) yields `None`.
pub fn parse_status_time(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once(TIME_MARKER)?;
    let stamp = rest.split_whitespace().next()?;
    let (sign, stamp) = match stamp.strip_prefix('-') {
        Some(unsigned) => (-1.0, unsigned),
        None => (1.0, stamp),
    };

    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = sign * (hours * 3600.0 + minutes * 60.0 + seconds);
    total.is_finite().then_some(total)
}

/// Stateful parser for one encode.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    total_secs: f64,
    bitrate: u64,
    started: Instant,
    last: Option<ProgressSample>,
}

impl ProgressParser {
    /// Start tracking an encode of `total_secs` of source at `bitrate` bits/s.
    /// The wall clock starts now.
    pub fn new(total_secs: f64, bitrate: u64) -> Self {
        Self {
            total_secs,
            bitrate,
            started: Instant::now(),
            last: None,
        }
    }

    /// Feed one status line, measuring wall time from construction.
    pub fn feed(&mut self, line: &str) -> Option<ProgressSample> {
        let wall = self.started.elapsed();
        self.feed_at(line, wall)
    }

    /// Feed one status line with an explicit wall-clock elapsed time.
    ///
    /// Returns `None`, leaving state untouched, when the line carries no
    /// parseable time.
    pub fn feed_at(&mut self, line: &str, wall: Duration) -> Option<ProgressSample> {
        if !line.contains(TIME_MARKER) {
            return None;
        }
        let Some(elapsed) = parse_status_time(line) else {
            tracing::trace!("Skipping unparseable status line: {}", line);
            return None;
        };
        self.observe(elapsed, wall)
    }

    /// Most recently emitted sample.
    pub fn last(&self) -> Option<&ProgressSample> {
        self.last.as_ref()
    }

    /// The terminal sample: fraction exactly 1 and nothing left to do.
    pub fn finish(&mut self) -> ProgressSample {
        let wall = self.started.elapsed();
        self.finish_at(wall)
    }

    /// [`finish`](Self::finish) with an explicit wall-clock elapsed time.
    pub fn finish_at(&mut self, wall: Duration) -> ProgressSample {
        let total = self.total_secs.max(0.0);
        let sample = ProgressSample {
            elapsed_secs: total,
            fraction: 1.0,
            wall_secs: wall.as_secs_f64(),
            throughput_bytes_per_sec: self.throughput(total, wall.as_secs_f64()),
            eta_secs: Some(0.0),
        };
        self.last = Some(sample);
        sample
    }

    fn throughput(&self, elapsed_secs: f64, wall_secs: f64) -> Option<f64> {
        if wall_secs <= 0.0 {
            return None;
        }
        let bytes_processed = self.bitrate as f64 / 8.0 * elapsed_secs;
        Some(bytes_processed / wall_secs)
    }

    fn observe(&mut self, elapsed: f64, wall: Duration) -> Option<ProgressSample> {
        if self.total_secs <= 0.0 {
            return None;
        }

        let elapsed = elapsed.clamp(0.0, self.total_secs);
        let mut fraction = (elapsed / self.total_secs).clamp(0.0, 1.0);
        if let Some(last) = &self.last {
            fraction = fraction.max(last.fraction);
        }

        let wall_secs = wall.as_secs_f64();
        let throughput = self.throughput(elapsed, wall_secs);

        // Source seconds encoded per wall second.
        let eta = throughput
            .filter(|t| *t > 0.0 && self.bitrate > 0)
            .map(|t| t * 8.0 / self.bitrate as f64)
            .map(|rate| ((self.total_secs - elapsed) / rate).max(0.0))
            .filter(|eta| eta.is_finite());

        let sample = ProgressSample {
            elapsed_secs: elapsed,
            fraction,
            wall_secs,
            throughput_bytes_per_sec: throughput,
            eta_secs: eta,
        };
        self.last = Some(sample);
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BITRATE: u64 = 754_974;

    fn stats_line(time: &str) -> String {
        format!("frame=  120 fps= 30 q=28.0 size=     256KiB time={time} bitrate= 412.3kbits/s speed=2.0x")
    }

    #[test]
    fn parses_ffmpeg_timestamps() {
        assert_eq!(parse_status_time(&stats_line("00:00:50.00")), Some(50.0));
        assert_eq!(parse_status_time(&stats_line("01:02:03.5")), Some(3723.5));
        assert_eq!(parse_status_time("out_time=00:00:10.000000"), Some(10.0));
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert_eq!(parse_status_time(&stats_line("N/A")), None);
        assert_eq!(parse_status_time(&stats_line("00:10")), None);
        assert_eq!(parse_status_time(&stats_line("00:00:10:00")), None);
        assert_eq!(parse_status_time("time="), None);
        assert_eq!(parse_status_time("no marker here"), None);
    }

    #[test]
    fn half_way_is_half() {
        let mut parser = ProgressParser::new(100.0, BITRATE);
        let sample = parser
            .feed_at(&stats_line("00:00:50.00"), Duration::from_secs(10))
            .unwrap();
        assert_eq!(sample.fraction, 0.5);
        assert_eq!(sample.percent(), 50);
        assert_eq!(sample.elapsed_secs, 50.0);
    }

    #[test]
    fn throughput_and_eta_follow_encode_speed() {
        let mut parser = ProgressParser::new(100.0, 800_000);
        // 50s of source in 25s of wall time: 2x realtime.
        let sample = parser
            .feed_at(&stats_line("00:00:50.00"), Duration::from_secs(25))
            .unwrap();

        // 100_000 bytes/s of source * 50s / 25s
        let throughput = sample.throughput_bytes_per_sec.unwrap();
        assert!((throughput - 200_000.0).abs() < 1e-6);
        // 50s of source left at 2x.
        assert!((sample.eta_secs.unwrap() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn eta_unknown_without_wall_time_or_progress() {
        let mut parser = ProgressParser::new(100.0, BITRATE);
        let first = parser
            .feed_at(&stats_line("00:00:01.00"), Duration::ZERO)
            .unwrap();
        assert_eq!(first.throughput_bytes_per_sec, None);
        assert_eq!(first.eta_secs, None);

        let mut parser = ProgressParser::new(100.0, BITRATE);
        let zero = parser
            .feed_at(&stats_line("00:00:00.00"), Duration::from_secs(1))
            .unwrap();
        assert_eq!(zero.throughput_bytes_per_sec, Some(0.0));
        assert_eq!(zero.eta_secs, None);
    }

    #[test]
    fn fraction_is_clamped_and_monotonic() {
        let mut parser = ProgressParser::new(100.0, BITRATE);
        let wall = Duration::from_secs(5);

        let over = parser.feed_at(&stats_line("00:02:00.00"), wall).unwrap();
        assert_eq!(over.fraction, 1.0);
        assert_eq!(over.eta_secs, Some(0.0));

        let back = parser.feed_at(&stats_line("00:00:30.00"), wall).unwrap();
        assert_eq!(back.fraction, 1.0);

        let mut parser = ProgressParser::new(100.0, BITRATE);
        let negative = parser.feed_at(&stats_line("-00:00:00.05"), wall).unwrap();
        assert_eq!(negative.fraction, 0.0);
        assert_eq!(negative.elapsed_secs, 0.0);
    }

    #[test]
    fn noise_lines_do_not_change_state() {
        let mut parser = ProgressParser::new(100.0, BITRATE);
        let wall = Duration::from_secs(2);
        let first = parser.feed_at(&stats_line("00:00:20.00"), wall).unwrap();

        for noise in [
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':",
            "  Duration: 00:01:40.00, start: 0.000000, bitrate: 1205 kb/s",
            "[libx264 @ 0x55d] using cpu capabilities: MMX2 SSE2Fast",
            "frame=    0 fps=0.0 q=0.0 size=       0KiB time=N/A bitrate=N/A speed=N/A",
        ] {
            assert!(parser.feed_at(noise, Duration::from_secs(3)).is_none());
        }

        assert_eq!(parser.last(), Some(&first));
    }

    #[test]
    fn zero_duration_never_emits() {
        let mut parser = ProgressParser::new(0.0, BITRATE);
        assert!(parser.feed_at(&stats_line("00:00:01.00"), Duration::from_secs(1)).is_none());
    }

    #[test]
    fn finish_reports_complete() {
        let mut parser = ProgressParser::new(100.0, BITRATE);
        parser.feed_at(&stats_line("00:00:99.00"), Duration::from_secs(9));
        let done = parser.finish_at(Duration::from_secs(10));
        assert_eq!(done.fraction, 1.0);
        assert_eq!(done.percent(), 100);
        assert_eq!(done.elapsed_secs, 100.0);
        assert_eq!(done.eta_secs, Some(0.0));
        assert_eq!(parser.last(), Some(&done));
    }

    #[test]
    fn sample_serializes() {
        let sample = ProgressSample {
            elapsed_secs: 1.0,
            fraction: 0.01,
            wall_secs: 0.5,
            throughput_bytes_per_sec: None,
            eta_secs: None,
        };
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["fraction"], 0.01);
        assert!(json["eta_secs"].is_null());
    }
}
