use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("language model error: {0}")]
    Llm(String),
    #[error("could not parse model output: {0}")]
    Parse(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        AppError::Internal(err.to_string())
    }

    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        AppError::Storage(err.to_string())
    }

    pub fn llm<E: std::fmt::Display>(err: E) -> Self {
        AppError::Llm(err.to_string())
    }

    pub fn parse<E: std::fmt::Display>(err: E) -> Self {
        AppError::Parse(err.to_string())
    }

    /// True when the failure came from malformed model output rather than
    /// from a collaborator being unreachable.
    pub fn is_parse(&self) -> bool {
        matches!(self, AppError::Parse(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_are_distinguishable() {
        assert!(AppError::parse("missing brace").is_parse());
        assert!(!AppError::llm("connection refused").is_parse());
    }

    #[test]
    fn io_errors_convert_transparently() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.to_string(), "gone");
    }
}
