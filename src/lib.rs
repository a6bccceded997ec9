//! # kvlog
//!
//! A durable key-value store with:
//! - An append-only transaction log for durability
//! - Startup replay that rebuilds state before any request is served
//! - A single log writer that totally orders every mutation
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │                  (Multiple Clients)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │        (reads → Store, writes → TransactionLogger)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐   apply   ┌─────────────┐
//!   │ Log Writer  │ ────────► │    Store    │
//!   │  (Append)   │           │  (RwLock)   │
//!   └─────────────┘           └─────────────┘
//!          ▲                         ▲
//!          │ run                     │ replay
//!   ┌─────────────┐           ┌─────────────┐
//!   │  Bootstrap  │ ────────► │ Log Reader  │
//!   └─────────────┘           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod store;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::Engine;
pub use store::Store;
pub use wal::{Event, EventType, TransactionLogger};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
