/// Result alias that carries the custom [`SwaraError`] type.
pub type Result<T> = std::result::Result<T, SwaraError>;

/// Common error type for the core crate.
///
/// Only setup, teardown and table loading produce these. The per-frame path
/// reports its outcomes as plain values and never fails.
#[derive(Debug, thiserror::Error)]
pub enum SwaraError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration, table or landmark script.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The hand tracker could not be brought up.
    #[error("hand tracker failed to initialize: {0}")]
    TrackerInit(String),
    /// The audio backend could not be brought up.
    #[error("audio backend failed to initialize: {0}")]
    AudioInit(String),
    /// A raga, tala or assignment table was rejected at load time.
    #[error("invalid table: {0}")]
    InvalidTable(String),
    /// A detected hand did not carry the expected number of landmarks.
    #[error("expected {expected} landmarks per hand, found {found}")]
    InvalidLandmarks { expected: usize, found: usize },
    /// The session has already been torn down.
    #[error("session has ended")]
    SessionEnded,
}

impl SwaraError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn table<T: Into<String>>(msg: T) -> Self {
        Self::InvalidTable(msg.into())
    }
}

impl From<&str> for SwaraError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SwaraError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
