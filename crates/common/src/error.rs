//! Error types shared across Splice crates.

/// Top-level error type for Splice operations.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("Media load error for '{source_key}': {message}")]
    MediaLoad { source_key: String, message: String },

    #[error("Media resolution failed for '{source_key}': {message}")]
    MediaResolution { source_key: String, message: String },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Transform error: {message}")]
    Transform { message: String },

    #[error("Track not found: {id}")]
    TrackNotFound { id: String },

    #[error("Track is locked: {id}")]
    TrackLocked { id: String },

    #[error("Invalid track '{id}': {message}")]
    InvalidTrack { id: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SpliceError.
pub type SpliceResult<T> = Result<T, SpliceError>;

impl SpliceError {
    pub fn media_load(source_key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MediaLoad {
            source_key: source_key.into(),
            message: msg.into(),
        }
    }

    pub fn media_resolution(source_key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MediaResolution {
            source_key: source_key.into(),
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform {
            message: msg.into(),
        }
    }

    pub fn track_not_found(id: impl Into<String>) -> Self {
        Self::TrackNotFound { id: id.into() }
    }

    pub fn track_locked(id: impl Into<String>) -> Self {
        Self::TrackLocked { id: id.into() }
    }

    pub fn invalid_track(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidTrack {
            id: id.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
