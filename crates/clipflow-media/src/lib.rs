//! FFmpeg CLI wrapper for video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with stderr capture and optional timeout
//! - The [`MediaToolkit`] collaborator used by the pipeline (frame
//!   extraction, clipping, platform transforms)

pub mod command;
pub mod error;
pub mod toolkit;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use toolkit::{collect_frames, FfmpegToolkit, MediaToolkit};
