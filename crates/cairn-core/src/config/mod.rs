pub mod environment;

pub use environment::{EnvironmentConfig, SyncMode, DEFAULT_MAX_SIZE_BYTES};
