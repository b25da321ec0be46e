use thiserror::Error;

/// Everything that can go wrong between the user's input and a rendered result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Bad or missing local input. Never sent over the network.
    #[error("{0}")] Validation(String),
    #[error("Image could not be loaded: {0}")] ImageLoad(String),
    #[error("Upload failed: {0}")] Upload(String),
    #[error("Generation failed: {0}")] Generation(String),
    #[error("Network error: {0}")] Network(String),
    /// A result could not be written to local disk.
    #[error("Could not save file: {0}")] Save(String),
    #[error("timeout")] Timeout,
    #[error("Generation cancelled")] Cancelled,
    #[error("A generation request is already in flight")] Busy,
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

    /// Whether the same action can be retried without changing any input.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::ImageLoad(_) | Self::Save(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { Self::Timeout } else { Self::Network(e.to_string()) }
    }
}

impl From<image::ImageError> for ClientError {
    fn from(e: image::ImageError) -> Self { Self::ImageLoad(e.to_string()) }
}
