use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("catalog fetch failed: {0}")]
    CatalogFetchFailed(String),

    #[error("invalid stream URL: {0}")]
    EmptyOrInvalidLocator(String),

    #[error("streaming client error: {0}")]
    StreamingClientFatal(String),

    #[error("media error: {0}")]
    NativeMediaError(String),

    #[error("all connection methods failed")]
    AllMethodsExhausted,

    #[error("player backend: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::CatalogFetchFailed(e.to_string())
    }
}
