use thiserror::Error;

#[derive(Error, Debug)]
pub enum RobertaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, RobertaError>;
