use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistrationError>;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl From<reqwest::Error> for RegistrationError {
    fn from(err: reqwest::Error) -> Self {
        RegistrationError::Network(err.to_string())
    }
}
