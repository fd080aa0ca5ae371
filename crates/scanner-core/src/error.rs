use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
