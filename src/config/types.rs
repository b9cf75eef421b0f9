use serde::{Deserialize, Serialize};
use shrinkray_common::{paths::DEFAULT_OUTPUT_SUFFIX, Codec, Container};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub encode: EncodeConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodeConfig {
    /// Encoder effort preset passed to `-preset` (default: "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Share of the target size given to the video bitrate (default: 0.9)
    #[serde(default = "default_margin")]
    pub margin: f64,

    /// Codec used when none is given on the command line
    #[serde(default)]
    pub codec: Codec,

    /// Container used when none is given on the command line
    #[serde(default)]
    pub container: Container,

    /// Appended to the input file stem to name the output
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Kill the encoder after this many seconds; 0 disables the limit
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EncodeConfig {
    /// Encoder timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_preset() -> String {
    shrinkray_av::encode::DEFAULT_PRESET.to_string()
}

fn default_margin() -> f64 {
    crate::planner::DEFAULT_MARGIN
}

fn default_output_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}

fn default_timeout_secs() -> u64 {
    86400 // 24 hours
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            margin: default_margin(),
            codec: Codec::default(),
            container: Container::default(),
            output_suffix: default_output_suffix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
