use lendscore_core::LendscoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Scoring setup error: {0}")]
    Core(#[from] LendscoreError),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Short machine-readable code, used in log fields
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Core(LendscoreError::InvalidConfig(_)) => "CONFIG_ERROR",
            AppError::Core(_) => "REGISTRY_ERROR",
            AppError::ExternalApi(_) => "EXTERNAL_API_ERROR",
            AppError::Io { .. } => "IO_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
