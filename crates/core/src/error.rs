/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
///
/// Nothing in the visualisation path is fatal: callers inside the crate turn
/// these into degraded visual states and log them. The variants exist so that
/// the reason survives long enough to be logged or asserted on in tests.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Free-form message for failures that do not warrant a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Input that cannot be processed at all.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Configuration values that fail validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Configuration file that is not valid JSON for [`crate::AppConfig`].
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The platform refused to create an analysis context or to tap a stream.
    #[error("audio attach denied: {0}")]
    AttachDenied(String),
    /// No drawable surface or graphics context is available.
    #[error("render surface unavailable: {0}")]
    SurfaceUnavailable(String),
    /// An operation was requested in a lifecycle state that does not allow it.
    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(&'static str),
    /// The FFT backend rejected its buffers.
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
