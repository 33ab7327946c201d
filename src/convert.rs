//! Screen-recording conversion through an external encoder process.

use crate::{
    config::Config,
    errors::{AppError, AppResult},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    str::FromStr,
    sync::Arc,
};
use tokio::{
    process::Command,
    time::{timeout, Duration},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Mp4,
    Avi,
    Gif,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Mp4 => "mp4",
            TargetFormat::Avi => "avi",
            TargetFormat::Gif => "gif",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(TargetFormat::Mp4),
            "avi" => Ok(TargetFormat::Avi),
            "gif" => Ok(TargetFormat::Gif),
            other => Err(AppError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Name offered to the browser for a converted recording.
pub fn download_name<Tz: TimeZone>(format: TargetFormat, at: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("cnc-recording-{}.{}", at.format("%Y%m%d_%H%M%S"), format.extension())
}

pub type DynEncoder = Arc<dyn Encoder + Send + Sync + 'static>;

#[async_trait]
pub trait Encoder {
    fn name(&self) -> &str;
    fn available(&self) -> bool;
    async fn convert(&self, input: Vec<u8>, format: TargetFormat) -> AppResult<Vec<u8>>;
}

pub struct FfmpegEncoder {
    program: String,
    pass_env: Vec<String>,
    timeout_s: u64,
}

impl FfmpegEncoder {
    pub fn new(cfg: &Config) -> Self {
        Self {
            program: cfg.convert.encoder.clone(),
            pass_env: cfg.convert.pass_env.clone(),
            timeout_s: cfg.limits.convert_timeout_s,
        }
    }

    fn resolve(&self) -> Option<PathBuf> {
        let path = if self.program.contains('/') {
            PathBuf::from(&self.program)
        } else {
            which::which(&self.program).ok()?
        };
        dunce::canonicalize(path).ok().filter(|p| p.is_file())
    }

    async fn run(&self, exe: &Path, args: &[OsString]) -> AppResult<()> {
        let mut command = Command::new(exe);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);
        // env policy: clear then insert pass_env
        command.env_clear();
        for k in &self.pass_env {
            if let Ok(v) = std::env::var(k) {
                command.env(k, v);
            }
        }

        let child = command
            .spawn()
            .map_err(|e| AppError::Internal(format!("failed to spawn {}: {e}", self.program)))?;
        let output = match timeout(Duration::from_secs(self.timeout_s), child.wait_with_output()).await {
            Ok(out) => out.map_err(|e| AppError::Internal(format!("waiting for {}: {e}", self.program)))?,
            Err(_) => {
                return Err(AppError::EncoderFailed {
                    encoder: self.program.clone(),
                    details: format!("timed out after {}s", self.timeout_s),
                })
            }
        };
        if !output.status.success() {
            return Err(AppError::EncoderFailed {
                encoder: self.program.clone(),
                details: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        &self.program
    }

    fn available(&self) -> bool {
        self.resolve().is_some()
    }

    async fn convert(&self, input: Vec<u8>, format: TargetFormat) -> AppResult<Vec<u8>> {
        let exe = self.resolve().ok_or_else(|| AppError::EncoderUnavailable(self.program.clone()))?;
        // removed with everything in it when dropped
        let scratch = tempfile::tempdir().map_err(|e| AppError::Internal(format!("scratch dir: {e}")))?;
        let input_path = scratch.path().join(format!("input_{}.webm", uuid::Uuid::new_v4()));
        let output_path = scratch.path().join(format!("output.{}", format.extension()));
        tokio::fs::write(&input_path, &input)
            .await
            .map_err(|e| AppError::Internal(format!("writing upload: {e}")))?;

        for args in passes(format, &input_path, scratch.path(), &output_path) {
            self.run(&exe, &args).await?;
        }
        tracing::info!(format = format.extension(), bytes_in = input.len(), "recording converted");

        tokio::fs::read(&output_path)
            .await
            .map_err(|e| AppError::Internal(format!("reading converted output: {e}")))
    }
}

/// Encoder invocations for `format`, in execution order.
pub fn passes(format: TargetFormat, input: &Path, scratch: &Path, output: &Path) -> Vec<Vec<OsString>> {
    fn args(parts: &[&dyn AsRef<std::ffi::OsStr>]) -> Vec<OsString> {
        parts.iter().map(|p| p.as_ref().to_os_string()).collect()
    }
    match format {
        TargetFormat::Mp4 => vec![args(&[
            &"-i", &input, &"-c:v", &"libx264", &"-preset", &"medium", &"-crf", &"23",
            &"-c:a", &"aac", &"-b:a", &"128k", &"-movflags", &"+faststart", &"-y", &output,
        ])],
        TargetFormat::Avi => vec![args(&[
            &"-i", &input, &"-c:v", &"mjpeg", &"-q:v", &"3", &"-c:a", &"pcm_s16le", &"-y", &output,
        ])],
        TargetFormat::Gif => {
            let palette = scratch.join("palette.png");
            vec![
                args(&[&"-i", &input, &"-vf", &"fps=15,scale=640:-1:flags=lanczos,palettegen", &"-y", &palette]),
                args(&[
                    &"-i", &input, &"-i", &palette,
                    &"-lavfi", &"fps=15,scale=640:-1:flags=lanczos[x];[x][1:v]paletteuse", &"-y", &output,
                ]),
            ]
        }
    }
}
