//! # shrinkray-av
//!
//! External tool handling for target-size transcodes.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`tools`]) -- find ffmpeg and ffprobe, preferring
//!   configured paths over `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   output capture, and live stderr line streaming with cancellation.
//! - **Duration probing** ([`probe_duration`]) -- ffprobe container duration.
//! - **Encoding** ([`EncodeSupervisor`]) -- bitrate-targeted ffmpeg runs.
//! - **Progress parsing** ([`ProgressParser`]) -- ffmpeg status lines to
//!   fraction, throughput and ETA.
//!
//! ## Example
//!
//! ```no_run
//! use shrinkray_av::{probe_duration, EncodeSettings, EncodeSupervisor, ProgressParser};
//! use shrinkray_common::Codec;
//! use std::path::{Path, PathBuf};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> shrinkray_av::Result<()> {
//! let input = Path::new("/videos/in.mp4");
//! let duration = probe_duration(Path::new("ffprobe"), input).await?;
//! let bitrate = 500_000;
//!
//! let mut parser = ProgressParser::new(duration, bitrate);
//! let supervisor = EncodeSupervisor::new(PathBuf::from("ffmpeg"), EncodeSettings::new(Codec::H264, bitrate));
//! supervisor
//!     .run(input, Path::new("/videos/out.mp4"), |line| {
//!         if let Some(sample) = parser.feed(line) {
//!             println!("{}%", sample.percent());
//!         }
//!     }, &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod encode;
mod error;
pub mod probe;
pub mod progress;
pub mod tools;

// Re-exports
pub use command::{StatusLineCodec, ToolCommand, ToolOutput};
pub use encode::{encode_args, EncodeSettings, EncodeSupervisor};
pub use error::{Error, Result};
pub use probe::{parse_duration_output, probe_duration};
pub use progress::{parse_status_time, ProgressParser, ProgressSample};
pub use tools::{check_tool, check_tools, require_tool, resolve_tool, ToolInfo};
