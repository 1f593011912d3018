use thiserror::Error;

/// Narration pipeline errors.
///
/// Per-item variants are absorbed by the preparation stage and the playback
/// controller and turned into skip decisions. Only `UnsupportedEnvironment`
/// (and input validation) reaches the caller as a hard failure.
#[derive(Error, Debug)]
pub enum NarrationError {
    /// No credential configured or remote synthesis disabled
    #[error("Remote synthesis unavailable: {0}")]
    RemoteUnavailable(String),

    /// Network, quota or server failure from the remote service
    #[error("Remote call failed (status {status:?}): {message}")]
    RemoteCallFailed { status: Option<u16>, message: String },

    /// A single playlist item could not be prepared
    #[error("Item {index} could not be prepared: {reason}")]
    ItemPrepFailed { index: usize, reason: String },

    /// The playback device rejected a load or play call
    #[error("Playback device error: {0}")]
    PlaybackDevice(String),

    /// An item did not finish within the configured timeout
    #[error("Item {index} timed out after {timeout_ms}ms")]
    ItemTimedOut { index: usize, timeout_ms: u64 },

    /// Neither remote synthesis nor a local narrator is available
    #[error("No speech output path available: {0}")]
    UnsupportedEnvironment(String),

    /// A session is already being prepared or played
    #[error("A session is already {0}")]
    Busy(&'static str),

    #[error("No prepared session")]
    NoSession,

    #[error("Belief text is empty")]
    EmptyBelief,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl NarrationError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteCallFailed { status, message: message.into() }
    }
}

impl From<reqwest::Error> for NarrationError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteCallFailed {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
