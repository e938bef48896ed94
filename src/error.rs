use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Music,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Image => f.write_str("background image"),
            AssetKind::Music => f.write_str("music"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShortsError {
    #[error("no {kind} files found in {}", .dir.display())]
    MissingAsset { kind: AssetKind, dir: PathBuf },

    #[error("quote file {} has no usable lines", .0.display())]
    EmptyQuoteFile(PathBuf),

    #[error("quote line {line} is out of range ({available} quotes in {})", .path.display())]
    QuoteOutOfRange {
        path: PathBuf,
        line: usize,
        available: usize,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("authorization failed: {0}")]
    AuthFailed(String),

    #[error("upload rejected with HTTP {status}: {body}")]
    UploadRejected { status: u16, body: String },
}
