use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CairnError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Slice {start}..{end} out of range for {count} entries")]
    OutOfRange {
        start: usize,
        end: usize,
        count: usize,
    },

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Use after close: {0}")]
    UseAfterClose(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl CairnError {
    /// True for errors that mean "the key was not there" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CairnError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CairnError>;

// Application errors:
//
// Closures handed to `with_store` return `cairn_core::Result`.
// Anything implementing `std::error::Error + Send + Sync + 'static` can be
// lifted into `CairnError::Other` with `?` through `anyhow`:
//
// fn import(store: &LmdbStore) -> Result<()> {
//     let text = std::fs::read_to_string("seed.json")?;           // Io
//     let rows: Vec<Row> = serde_json::from_str(&text)
//         .map_err(anyhow::Error::from)?;                         // Other
//     ...
// }
