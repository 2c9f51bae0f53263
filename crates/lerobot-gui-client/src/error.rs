use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl Error {
    /// HTTP status of a rejected request, if the backend answered at all.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Http(err) => err.status(),
            _ => None,
        }
    }
}
