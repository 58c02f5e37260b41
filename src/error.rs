use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidbriefError {
    #[error("failed to fetch summary: {reason}")]
    Transport { reason: String },

    #[error("{capability} is not available on this system")]
    Unsupported { capability: &'static str },

    #[error("speech recognition failed: {reason}")]
    Recognition { reason: String },

    #[error("speech playback failed: {reason}")]
    Playback { reason: String },

    #[error("there is no text to act on")]
    EmptyText,

    #[error("missing user token: {env_var} environment variable is not set")]
    MissingToken { env_var: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VidbriefError>;
