pub type TickerResult<T> = Result<T, TickerError>;

#[derive(thiserror::Error, Debug)]
pub enum TickerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("remote session error: {0}")]
    Remote(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("composition error: {0}")]
    Composition(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TickerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    /// True when the shared remote browser failed, as opposed to local image work.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
