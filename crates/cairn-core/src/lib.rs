//! Cairn Core: engine-agnostic pieces of the cairn access layer
//!
//! This crate defines what a cairn store does without tying it to a storage
//! engine:
//! - Record codec: one buffer holding a JSON value plus an optional attachment
//! - Transaction manager: reference-counted sharing of one physical transaction
//! - Scan protocol: index-bounded slices and early-stoppable filters over a cursor
//! - `RecordStore`: the operations every named store provides
//!
//! The LMDB implementation lives in `cairn-lmdb`.

pub mod config;
pub mod error;
pub mod observe;
pub mod record;
pub mod scan;
pub mod traits;
pub mod txn;

pub use config::{EnvironmentConfig, SyncMode, DEFAULT_MAX_SIZE_BYTES};
pub use error::{CairnError, Result};
pub use record::Record;
pub use scan::{Entries, Entry, FilterContext, FilterMatch};
pub use traits::RecordStore;
pub use txn::{TransactionManager, TxnBackend, TxnMode, TxnStats};
