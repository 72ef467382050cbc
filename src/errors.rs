use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Rate limited by external provider")]
    RateLimited,
    #[error("Provider quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("External error: {0}")]
    External(String),
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        AppError::Db(sqlx::Error::Migrate(Box::new(value)))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Checkpoint(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::Checkpoint(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_checkpoint_errors() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(matches!(err, AppError::Checkpoint(msg) if msg.contains("disk full")));
    }
}
