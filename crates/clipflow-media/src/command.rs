//! `ffmpeg` invocations.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One `ffmpeg` invocation with a single input and a single output.
///
/// Arguments are split around `-i`: seeking and duration go before the
/// input so ffmpeg seeks on the demuxer, filters and codecs go after it.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    before_input: Vec<String>,
    after_input: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            before_input: Vec::new(),
            after_input: Vec::new(),
        }
    }

    fn pre(mut self, flag: &str, value: String) -> Self {
        self.before_input.push(flag.to_string());
        self.before_input.push(value);
        self
    }

    fn post(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.after_input.push(flag.to_string());
        self.after_input.push(value.into());
        self
    }

    /// Start reading at `seconds`.
    pub fn seek(self, seconds: f64) -> Self {
        self.pre("-ss", format!("{:.3}", seconds))
    }

    /// Read `seconds` of input.
    pub fn duration(self, seconds: f64) -> Self {
        self.pre("-t", format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.post("-vf", filter)
    }

    /// Sample `fps` frames per second into an image sequence.
    pub fn frame_rate_filter(self, fps: f64) -> Self {
        self.video_filter(format!("fps={}", fps))
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.post("-c:v", codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.post("-c:a", codec)
    }

    /// Copy every stream as is.
    pub fn stream_copy(self) -> Self {
        self.post("-c", "copy")
    }

    /// Full argument list, always overwriting the output and logging errors only.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];
        args.extend(self.before_input.iter().cloned());
        args.push("-i".into());
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(self.after_input.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Spawns `ffmpeg` and waits for it, optionally with a deadline.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill ffmpeg if it runs longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let binary = check_ffmpeg()?;
        let args = cmd.build_args();
        debug!("ffmpeg {}", args.join(" "));

        let child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            None => child.wait_with_output().await?,
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    // kill_on_drop reaps the process
                    warn!("ffmpeg exceeded {:?}, killed", limit);
                    return Err(MediaError::Timeout(limit.as_secs()));
                }
            },
        };

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(MediaError::ffmpeg_failed(
            "ffmpeg exited with non-zero status",
            (!stderr.is_empty()).then_some(stderr),
            output.status.code(),
        ))
    }
}

/// Locate the `ffmpeg` binary on `PATH`.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
