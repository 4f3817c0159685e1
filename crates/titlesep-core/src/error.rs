use thiserror::Error;

#[derive(Error, Debug)]
pub enum TitleSepError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),
}

pub type Result<T> = std::result::Result<T, TitleSepError>;
