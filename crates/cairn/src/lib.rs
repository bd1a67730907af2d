//! Cairn: transactional JSON key-value stores on LMDB
//!
//! Cairn provides:
//! - **Environments**: one LMDB directory, opened once per process through
//!   an [`EnvironmentRegistry`]
//! - **Named stores**: ordered sub-databases of records, each a JSON value
//!   plus an optional binary attachment
//! - **Shared transactions**: operations join an open transaction by
//!   reference count; [`WriteBatch`] and [`Snapshot`] make the scope explicit
//! - **Scans**: index-bounded `keys` and `iterate`, and predicate `filter`
//!   with early stop
//!
//! # Quick Start
//!
//! ```no_run
//! use cairn::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> Result<()> {
//! let registry = EnvironmentRegistry::new();
//! let env = registry.open(EnvironmentConfig::new("./data", 8))?;
//! let docs = env.store("docs")?;
//!
//! // Several writes, one commit
//! let batch = docs.batch()?;
//! docs.put(b"readme", &json!({ "title": "Read me" }), Some(&b"raw bytes"[..]))?;
//! docs.put(b"license", &json!({ "title": "License" }), None)?;
//! batch.commit()?;
//!
//! let titles = docs.filter(true, |_, record, _| {
//!     record.is_some_and(|r| r.value["title"].is_string())
//! })?;
//! assert_eq!(titles.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod prelude;
pub mod typed;

pub use cairn_core::{
    config::{EnvironmentConfig, SyncMode, DEFAULT_MAX_SIZE_BYTES},
    error::{CairnError, Result},
    record::Record,
    scan::{Entries, Entry, FilterContext, FilterMatch},
    traits::RecordStore,
    txn::{TxnMode, TxnStats},
};

pub use cairn_lmdb::{
    EnvironmentRegistry, LmdbEnvironment, LmdbStore, Snapshot, WriteBatch, MAX_KEY_LEN,
};

pub use typed::TypedStore;
