use thiserror::Error;

/// Everything that can abort a single check of one source.
///
/// Row-level malformation is not represented here: short rows are dropped by
/// the extractor and never surface as errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(String),
}

impl EngineError {
    pub fn extraction(msg: impl Into<String>) -> Self {
        EngineError::Extraction(msg.into())
    }
}
