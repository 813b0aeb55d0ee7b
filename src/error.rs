use std::sync::Arc;

/// Result type for fallible operations of this crate.
///
/// Flag evaluation never fails (failures are reported inside
/// [`ProviderEvaluation`](crate::ProviderEvaluation)), so this is only returned when building or
/// shutting down a [`LocalClient`](crate::LocalClient).
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside of flag evaluation.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The override document is not valid JSON or does not match the document shape.
    #[error("error parsing flag override document")]
    ConfigurationParse(#[source] Arc<serde_json::Error>),

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigurationParse(Arc::new(value))
    }
}
