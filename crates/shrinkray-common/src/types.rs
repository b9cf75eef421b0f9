//! Core type definitions for transcode requests.
//!
//! Codecs and containers serialize as the strings ffmpeg and the file system
//! use (`libx264`, `.mp4`) and deserialize from any accepted alias, so config
//! files and CLI flags share one parser.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Bytes in one megabyte, as used for target sizes.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Video encoder used for the transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Codec {
    /// H.264 via libx264.
    #[default]
    H264,
    /// H.265 via libx265.
    H265,
    /// VP9 via libvpx-vp9.
    Vp9,
    /// AV1 via libaom-av1.
    Av1,
}

impl Codec {
    /// All supported codecs, in menu order.
    pub const ALL: [Codec; 4] = [Codec::H264, Codec::H265, Codec::Vp9, Codec::Av1];

    /// The ffmpeg encoder name passed to `-c:v`.
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
        }
    }

    /// Human-readable format name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::H264 => "H.264",
            Self::H265 => "H.265",
            Self::Vp9 => "VP9",
            Self::Av1 => "AV1",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoder_name())
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "libx264" | "x264" | "h264" | "h.264" | "avc" => Ok(Self::H264),
            "libx265" | "x265" | "h265" | "h.265" | "hevc" => Ok(Self::H265),
            "libvpx-vp9" | "vp9" => Ok(Self::Vp9),
            "libaom-av1" | "av1" => Ok(Self::Av1),
            _ => Err(Error::UnknownCodec(s.to_string())),
        }
    }
}

impl TryFrom<String> for Codec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Codec> for String {
    fn from(codec: Codec) -> Self {
        codec.encoder_name().to_string()
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Container {
    /// MPEG-4 Part 14.
    #[default]
    Mp4,
    /// Matroska.
    Mkv,
    /// QuickTime.
    Mov,
    /// WebM.
    Webm,
}

impl Container {
    /// All supported containers, in menu order.
    pub const ALL: [Container; 4] = [
        Container::Mp4,
        Container::Mkv,
        Container::Mov,
        Container::Webm,
    ];

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => ".mp4",
            Self::Mkv => ".mkv",
            Self::Mov => ".mov",
            Self::Webm => ".webm",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for Container {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        match normalized.trim_start_matches('.') {
            "mp4" => Ok(Self::Mp4),
            "mkv" => Ok(Self::Mkv),
            "mov" => Ok(Self::Mov),
            "webm" => Ok(Self::Webm),
            _ => Err(Error::UnknownContainer(s.to_string())),
        }
    }
}

impl TryFrom<String> for Container {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Container> for String {
    fn from(container: Container) -> Self {
        container.extension().to_string()
    }
}

/// Desired output size in bytes. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSize(u64);

impl TargetSize {
    /// Create a target from a byte count. Returns `None` for zero.
    pub fn from_bytes(bytes: u64) -> Option<Self> {
        (bytes > 0).then_some(Self(bytes))
    }

    /// Create a target from whole megabytes. Returns `None` for zero or on
    /// overflow.
    pub fn from_megabytes(mb: u64) -> Option<Self> {
        mb.checked_mul(BYTES_PER_MB).and_then(Self::from_bytes)
    }

    /// Target size in bytes.
    pub fn bytes(&self) -> u64 {
        self.0
    }

    /// Target size in (possibly fractional) megabytes.
    pub fn megabytes(&self) -> f64 {
        self.0 as f64 / BYTES_PER_MB as f64
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} MB", self.megabytes())
    }
}

/// Parses user input in megabytes. Only ASCII digits are accepted, so signs,
/// decimals and units are rejected rather than guessed at.
impl FromStr for TargetSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_target_size(s));
        }

        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Self::from_megabytes)
            .ok_or_else(|| Error::invalid_target_size(s))
    }
}
