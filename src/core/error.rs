use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("seems like you didn't configure any repositories")]
    MissingRepositoryConfig,

    #[error("no 'default' repository is configured and none could be inferred")]
    MissingDefaultRepository,

    #[error("database config '{0}' is missing the 'adapter' key")]
    MissingAdapter(String),

    #[error("cannot build connection URI for adapter '{0}': {1}")]
    UriBuild(String, String),

    #[error("configuration is not set, call set_configuration first")]
    NotConfigured,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
