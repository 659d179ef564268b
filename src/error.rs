use thiserror::Error;

/// Failures the radio surfaces to the listener. None of them are fatal: every
/// variant ends up as a status line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("malformed playlist: {0}")]
    ParseFailure(String),
    #[error("playlist is empty")]
    Empty,
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),
    #[error("track unavailable: {0}")]
    SourceUnsupportedOrMissing(String),
}

impl RadioError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::PlaybackBlocked(_))
    }
}
