//! LMDB binding for the cairn access layer
//!
//! Key features:
//! - One environment per canonical directory, tracked by a registry
//! - Named stores over LMDB sub-databases
//! - A single write transaction per environment shared by reference count
//! - Per-store read transactions with slice and filter scans
//! - Explicit write batches and read snapshots
//!
//! Everything here is single-threaded: handles are `!Send` and the
//! environment is opened with `NO_TLS`.

pub mod env;
pub mod keys;
pub mod registry;
pub mod scope;
pub mod store;
pub mod txn;

pub use env::LmdbEnvironment;
pub use keys::MAX_KEY_LEN;
pub use registry::EnvironmentRegistry;
pub use scope::{Snapshot, WriteBatch};
pub use store::LmdbStore;
pub use txn::{OwnedRoTxn, OwnedRwTxn, ReadAccess, ReadBackend, WriteBackend};
