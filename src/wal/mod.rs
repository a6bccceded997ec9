//! Transaction Log Module
//!
//! Provides durability through an append-only log of store mutations.
//!
//! ## Responsibilities
//! - Append every mutation before it becomes visible
//! - Sequence numbers for ordering, assigned by a single writer
//! - Replay on startup, rejecting malformed or out-of-order records
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ 1 \t 2 \t key \t value \n        (put)       │
//! │ 2 \t 1 \t key \t \n              (delete)    │
//! │ ...                                          │
//! └──────────────────────────────────────────────┘
//! ```
//! One UTF-8 record per line: sequence, event type (`1` delete, `2` put),
//! key, value. See [`Event`] for field escaping.

mod event;
mod writer;
mod reader;
mod recovery;
mod logger;

pub use event::{DecodeError, Event, EventType, FIELD_COUNT, FIELD_DELIMITER};
pub use writer::{LogSink, LogWriter};
pub use reader::{LogIterator, LogReader};
pub use recovery::{replay_into, ReplayStats};
pub use logger::{LoggerState, TransactionLogger, DEFAULT_WRITE_BUFFER};
