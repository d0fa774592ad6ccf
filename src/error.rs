use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// Short machine-readable code carried by injected `Error` events
    pub fn error_type(&self) -> &'static str {
        match self {
            StreamError::Http(_) | StreamError::Upstream { .. } => "http_error",
            StreamError::Config(_) => "config_error",
        }
    }
}

impl From<std::convert::Infallible> for StreamError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
