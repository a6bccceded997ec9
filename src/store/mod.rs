//! Store Module
//!
//! The authoritative in-memory key-value mapping.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Shared lock for readers, exclusive lock for every mutation
//! - Apply replayed and live transaction log events
//!
//! ## Data Structure Choice
//! HashMap wrapped in a parking_lot RwLock:
//! - No key ordering is needed (nothing is flushed to sorted files)
//! - The store is rebuilt from the transaction log on every start

mod table;

pub use table::Store;
