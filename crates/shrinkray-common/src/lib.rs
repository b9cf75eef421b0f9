//! Shrinkray-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across shrinkray:
//!
//! - **Typed IDs**: UUID wrapper identifying a transcode job
//! - **Core Types**: Codec and container choices, target sizes
//! - **Path Utilities**: Output path derivation and media file detection
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use shrinkray_common::{Codec, Container, TargetSize};
//! use shrinkray_common::paths::compressed_output_path;
//! use std::path::Path;
//!
//! let target: TargetSize = "10".parse().unwrap();
//! assert_eq!(target.bytes(), 10 * 1024 * 1024);
//!
//! let codec: Codec = "h265".parse().unwrap();
//! assert_eq!(codec.encoder_name(), "libx265");
//!
//! let output = compressed_output_path(Path::new("clip.mov"), Container::Mp4, "_compressed");
//! assert_eq!(output, Path::new("clip_compressed.mp4"));
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
