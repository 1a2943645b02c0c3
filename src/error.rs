use thiserror::Error;

/// Errors surfaced by the camp spawner.
///
/// Expected misses (no placement found, a factory returning nothing, a full
/// container, a stale record) are not errors; they are reported through
/// `Option`/`bool` returns and [`crate::engine::SpawnOutcome`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required config table '{0}'")]
    MissingTable(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to persist '{key}': {source}")]
    PersistenceWriteFailed {
        key: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
