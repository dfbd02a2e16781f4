//! Audio format conversion through an external ffmpeg binary.
//!
//! Inputs are resolved inside the conversion directory only. Outputs are
//! written next to the input as `<stem>-converted-<epoch-millis>.<target>`.

use chrono::Utc;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tokio::{fs, process::Command};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    fn other(self) -> Self {
        match self {
            AudioFormat::Mp3 => AudioFormat::Wav,
            AudioFormat::Wav => AudioFormat::Mp3,
        }
    }

    fn of_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for AudioFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(ConvertError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("target must be mp3 or wav, got `{0}`")]
    UnsupportedFormat(String),
    #[error("invalid input filename `{0}`")]
    InvalidInput(String),
    #[error("input file does not exist")]
    InputMissing,
    #[error("cannot detect input format; specify target explicitly")]
    UndetectedFormat,
    #[error("encoder failed: {0}")]
    EncoderFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct ConvertService {
    uploads_dir: PathBuf,
    ffmpeg: String,
}

impl ConvertService {
    pub fn new(uploads_dir: impl Into<PathBuf>, ffmpeg: impl Into<String>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Convert `filename` to `target`, or to the other supported format when
    /// `target` is `None`. Returns the output path; converting a file to its
    /// own format returns the input path untouched.
    pub async fn convert(
        &self,
        filename: &str,
        target: Option<AudioFormat>,
    ) -> Result<PathBuf, ConvertError> {
        let input = self.resolve_input(filename)?;
        fs::create_dir_all(&self.uploads_dir).await?;
        if !fs::try_exists(&input).await? {
            return Err(ConvertError::InputMissing);
        }

        let detected = AudioFormat::of_path(&input);
        let target = match (target, detected) {
            (Some(target), _) => target,
            (None, Some(detected)) => detected.other(),
            (None, None) => return Err(ConvertError::UndetectedFormat),
        };
        if detected == Some(target) {
            return Ok(input);
        }

        let output = output_path(&input, target, Utc::now().timestamp_millis());
        tracing::info!(input = %input.display(), output = %output.display(), %target, "converting audio");

        let result = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&input)
            .arg(&output)
            .output()
            .await
            .map_err(|e| ConvertError::EncoderFailed(format!("could not run {}: {e}", self.ffmpeg)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let _ = fs::remove_file(&output).await;
            return Err(ConvertError::EncoderFailed(stderr));
        }

        Ok(output)
    }

    fn resolve_input(&self, filename: &str) -> Result<PathBuf, ConvertError> {
        let candidate = Path::new(filename);
        let plain = !filename.is_empty()
            && !candidate.is_absolute()
            && candidate
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_)));
        if !plain {
            return Err(ConvertError::InvalidInput(filename.to_string()));
        }
        Ok(self.uploads_dir.join(candidate))
    }
}

fn output_path(input: &Path, target: AudioFormat, stamp: i64) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}-converted-{stamp}.{target}"))
}
