//! Cairn Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use cairn::prelude::*;
//! ```

// Core types
pub use crate::{CairnError, Entries, Entry, FilterContext, FilterMatch, Record, Result};

// Configs
pub use crate::{EnvironmentConfig, SyncMode};

// Traits
pub use crate::RecordStore;

// Implementations
pub use crate::{EnvironmentRegistry, LmdbEnvironment, LmdbStore, TypedStore};

// Scopes
pub use crate::{Snapshot, WriteBatch};

// Re-export common external deps
pub use anyhow;
pub use serde::{Deserialize, Serialize};
pub use tracing;
