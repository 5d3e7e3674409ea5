use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
    #[error(transparent)]
    Store(#[from] engine::StoreError),
    #[error("invalid timezone: {0}")]
    Timezone(String),
    #[error("{0} not found or not allowed")]
    NotApplied(String),
    #[error("{0}")]
    Usage(String),
}
