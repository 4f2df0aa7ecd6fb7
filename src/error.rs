use std::path::PathBuf;

use thiserror::Error;

use crate::quality::RejectReason;

pub type SynthResult<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid glyph for {character:?}: {reason}")]
    InvalidGlyph { character: char, reason: String },

    #[error("cannot compose an empty line")]
    EmptyInput,

    #[error("sample rejected by quality gate: {}", join_reasons(.0))]
    QualityRejection(Vec<RejectReason>),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("worker fault in shard {shard}: {message}")]
    WorkerFault { shard: usize, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SynthError {
    pub(crate) fn invalid_glyph(character: char, reason: impl Into<String>) -> Self {
        Self::InvalidGlyph {
            character,
            reason: reason.into(),
        }
    }
}

/// Failure reported by a [`crate::sample::DatasetWriter`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to serialize labels for {}: {source}", path.display())]
    Labels {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn join_reasons(reasons: &[RejectReason]) -> String {
    reasons
        .iter()
        .map(|reason| reason.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
