use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgusError {
    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("project '{0}' is not valid: {1}")]
    ProjectInvalid(String, String),

    #[error("invalid pattern '{0}': {1}")]
    InvalidPattern(String, String),

    #[error("invalid category '{0}'")]
    InvalidCategory(String),

    #[error("invalid document status '{0}'")]
    InvalidStatus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Watcher errors
    #[error("watch error: {0}")]
    Watch(String),

    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("daemon is not running")]
    NotRunning,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("{0}")]
    Other(String),
}

impl From<notify::Error> for ArgusError {
    fn from(err: notify::Error) -> Self {
        ArgusError::Watch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArgusError>;
