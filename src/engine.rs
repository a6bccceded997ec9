//! Engine Module
//!
//! The core that ties the store to its transaction log.
//!
//! ## Responsibilities
//! - Bootstrap: replay the log into the store before serving anything
//! - Route durable writes through the transaction logger
//! - Serve reads straight from the store
//! - Surface logger failures so writes are rejected once logging halts

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::protocol::Command;
use crate::store::Store;
use crate::wal::{replay_into, ReplayStats, TransactionLogger};

/// Bootstrap progress
///
/// ```text
/// Idle ──► Replaying ──► Live
///              │
///              └──────► ReplayFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootstrapState {
    Idle,
    Replaying,
    ReplayFailed,
    Live,
}

/// Drives a logger from replay mode into write mode
struct Bootstrap {
    state: BootstrapState,
}

impl Bootstrap {
    fn new() -> Self {
        Self {
            state: BootstrapState::Idle,
        }
    }

    fn transition(&mut self, next: BootstrapState) {
        tracing::debug!("bootstrap {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Replay `logger` into `store`, then start the writer
    fn run(&mut self, logger: &mut TransactionLogger, store: &Arc<Store>) -> Result<ReplayStats> {
        let (events, errors) = logger.read_events()?;
        self.transition(BootstrapState::Replaying);

        let stats = match replay_into(store, events, errors) {
            Ok(stats) => stats,
            Err(err) => {
                self.transition(BootstrapState::ReplayFailed);
                tracing::error!("replay of {} failed: {}", logger.path().display(), err);
                return Err(err);
            }
        };

        logger.run(Arc::clone(store))?;
        self.transition(BootstrapState::Live);
        Ok(stats)
    }
}

/// The key-value engine
///
/// ## Concurrency Model
///
/// - **Reads** (get): shared lock on the store, concurrent with each other
/// - **Writes** (put/delete): enqueued on the logger; its single worker
///   appends them in order and applies each to the store under the
///   exclusive lock. Callers block until their write is applied.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Authoritative key-value state
    store: Arc<Store>,

    /// Transaction log in write mode
    logger: TransactionLogger,

    /// What startup replay found
    replay_stats: ReplayStats,
}

impl Engine {
    const LOG_FILENAME: &'static str = "transaction.log";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create data directory
    /// 2. Open (or create) the transaction log
    /// 3. Replay every record into a fresh store
    /// 4. Start the log writer
    ///
    /// An invalid config or any replay error is returned and nothing is
    /// started.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let log_path = config.data_dir.join(Self::LOG_FILENAME);

        let mut logger = TransactionLogger::open(&log_path, config.sync_strategy)?
            .with_write_buffer(config.write_buffer);
        let store = Arc::new(Store::new());

        let replay_stats = Bootstrap::new().run(&mut logger, &store)?;

        tracing::info!(
            "replayed {} events ({} puts, {} deletes), last sequence {}, {} keys live",
            replay_stats.events_applied,
            replay_stats.puts,
            replay_stats.deletes,
            replay_stats.last_sequence,
            store.len()
        );

        Ok(Self {
            config,
            store,
            logger,
            replay_stats,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Execute a command
    pub fn execute(&self, command: Command) -> Result<Option<String>> {
        match command {
            Command::Get { key } => self.get(&key).map(Some),
            Command::Put { key, value } => {
                self.put(&key, &value)?;
                Ok(None)
            }
            Command::Delete { key } => {
                self.delete(&key)?;
                Ok(None)
            }
            Command::Ping => Ok(Some("PONG".to_string())),
        }
    }

    /// Get the value for `key`
    pub fn get(&self, key: &str) -> Result<String> {
        self.store.get(key)
    }

    /// Durably put a key-value pair
    ///
    /// Returns once the record is in the log and the store reflects it.
    pub fn put(&self, key: &str, value: &str) -> Result<u64> {
        self.logger.commit_put(key, value)
    }

    /// Durably delete a key (absent keys are not an error)
    pub fn delete(&self, key: &str) -> Result<u64> {
        self.logger.commit_delete(key)
    }

    /// Receiver for logger failures
    pub fn errors(&self) -> Receiver<KvError> {
        self.logger.errors()
    }

    /// False once the log writer has halted
    pub fn is_writable(&self) -> bool {
        !self.logger.is_halted()
    }

    /// Close the engine, syncing the log
    pub fn close(self) -> Result<()> {
        self.logger.close()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn replay_stats(&self) -> ReplayStats {
        self.replay_stats
    }

    /// Last sequence number written to the log
    pub fn last_sequence(&self) -> u64 {
        self.logger.last_sequence()
    }

    pub fn log_path(&self) -> &Path {
        self.logger.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
