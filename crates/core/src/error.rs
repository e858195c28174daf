/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
///
/// The first three variants are the conditions a [`crate::PlaybackController`]
/// reports to its observers. None of them are fatal: they are logged and
/// surfaced through [`crate::PlaybackObserver::on_error`].
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The media handle is missing at call time (not mounted or disposed).
    #[error("media resource is not available")]
    ResourceUnavailable,
    /// The platform refused to start playback.
    #[error("failed to start playback: {0}")]
    PlaybackStart(String),
    /// The media resource failed while it was playing.
    #[error("playback error: {0}")]
    Runtime(String),
    /// A media resource can only feed a single analysis graph.
    #[error("media resource is already connected to an analysis graph")]
    AlreadyTapped,
    /// The audio host refused to open another processing session.
    #[error("audio host already has {limit} live sessions")]
    SessionLimit { limit: usize },
    /// The analysis graph was released and cannot be rebuilt.
    #[error("analysis graph has been released")]
    GraphReleased,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Fft(#[from] realfft::FftError),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
