//! Transaction Logger
//!
//! Owns the log file and coordinates the replay reader and the live writer.
//!
//! ## Lifecycle
//! ```text
//! open ──► read_events (optional, once) ──► run (once) ──► close
//!          replay mode                     write mode
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::config::SyncStrategy;
use crate::error::{KvError, Result};
use crate::store::Store;

use super::writer::PendingWrite;
use super::{Event, LogReader, LogWriter};

/// Default capacity of the pending-write queue
pub const DEFAULT_WRITE_BUFFER: usize = 16;

/// Where a logger is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// File open, nothing started
    Opened,
    /// Replay reader started
    Replaying,
    /// Live writer accepting requests
    Running,
    /// Writer stopped by `close`
    Closed,
}

/// File-backed transaction logger
pub struct TransactionLogger {
    path: PathBuf,

    /// Handed to the writer by `run`
    file: Option<File>,

    sync_strategy: SyncStrategy,
    write_buffer: usize,
    state: LoggerState,

    /// Last sequence observed by replay or assigned by the writer
    last_sequence: Arc<AtomicU64>,

    /// Set by the writer after a write failure
    halted: Arc<AtomicBool>,

    requests: Option<Sender<PendingWrite>>,
    errors_tx: Sender<KvError>,
    errors_rx: Receiver<KvError>,

    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<Result<()>>>,
}

impl TransactionLogger {
    /// Open or create a log file
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let (errors_tx, errors_rx) = bounded(1);

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            sync_strategy,
            write_buffer: DEFAULT_WRITE_BUFFER,
            state: LoggerState::Opened,
            last_sequence: Arc::new(AtomicU64::new(0)),
            halted: Arc::new(AtomicBool::new(false)),
            requests: None,
            errors_tx,
            errors_rx,
            reader: None,
            writer: None,
        })
    }

    /// Set the pending-write queue capacity (at least 1)
    pub fn with_write_buffer(mut self, capacity: usize) -> Self {
        self.write_buffer = capacity.max(1);
        self
    }

    /// Start replaying the log
    ///
    /// Returns the event stream and a separate error stream; see
    /// [`LogReader::spawn`]. Both must be drained before calling [`run`].
    ///
    /// [`run`]: TransactionLogger::run
    pub fn read_events(&mut self) -> Result<(Receiver<Event>, Receiver<KvError>)> {
        if self.state != LoggerState::Opened {
            return Err(KvError::InvalidState("events can only be read once, before run"));
        }
        let file = self
            .file
            .as_ref()
            .ok_or(KvError::InvalidState("log file already handed to the writer"))?;

        let mut replay_file = file.try_clone()?;
        replay_file.seek(SeekFrom::Start(0))?;

        let reader = LogReader::new(BufReader::new(replay_file), Arc::clone(&self.last_sequence));
        let (events, errors, handle) = reader.spawn(self.write_buffer)?;

        self.reader = Some(handle);
        self.state = LoggerState::Replaying;
        tracing::debug!(path = %self.path.display(), "replay started");

        Ok((events, errors))
    }

    /// Start the live writer
    ///
    /// Accepted events are appended in enqueue order and then applied to
    /// `store`. Waits for the replay reader, if any, to finish first.
    pub fn run(&mut self, store: Arc<Store>) -> Result<()> {
        if !matches!(self.state, LoggerState::Opened | LoggerState::Replaying) {
            return Err(KvError::InvalidState("run can only be called once"));
        }

        if let Some(reader) = self.reader.take() {
            reader
                .join()
                .map_err(|_| KvError::InvalidState("replay worker panicked"))?;
        }

        let file = self
            .file
            .take()
            .ok_or(KvError::InvalidState("log file already handed to the writer"))?;

        let (requests_tx, requests_rx) = bounded(self.write_buffer);
        let writer = LogWriter::new(file, self.sync_strategy, Arc::clone(&self.last_sequence));
        let handle = writer.spawn(
            store,
            requests_rx,
            self.errors_tx.clone(),
            Arc::clone(&self.halted),
        )?;

        self.requests = Some(requests_tx);
        self.writer = Some(handle);
        self.state = LoggerState::Running;
        tracing::info!(
            path = %self.path.display(),
            last_sequence = self.last_sequence(),
            "transaction logger running"
        );

        Ok(())
    }

    /// Enqueue a put without waiting for it to be written
    ///
    /// Fails with [`KvError::EmptyKey`] before anything is queued if `key`
    /// is empty.
    pub fn write_put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.enqueue(Event::put(key, value), None)
    }

    /// Enqueue a delete without waiting for it to be written
    pub fn write_delete(&self, key: impl Into<String>) -> Result<()> {
        self.enqueue(Event::delete(key), None)
    }

    /// Enqueue a put and wait until it is written and applied
    ///
    /// Returns the assigned sequence number.
    pub fn commit_put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<u64> {
        self.commit(Event::put(key, value))
    }

    /// Enqueue a delete and wait until it is written and applied
    pub fn commit_delete(&self, key: impl Into<String>) -> Result<u64> {
        self.commit(Event::delete(key))
    }

    fn commit(&self, event: Event) -> Result<u64> {
        let (ack_tx, ack_rx) = bounded(1);
        self.enqueue(event, Some(ack_tx))?;
        // A dropped acknowledgement means the writer stopped first.
        ack_rx.recv().map_err(|_| KvError::LoggerHalted)?
    }

    fn enqueue(&self, event: Event, ack: Option<Sender<Result<u64>>>) -> Result<()> {
        // Replay refuses a record with an empty key.
        if event.key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        if self.is_halted() {
            return Err(KvError::LoggerHalted);
        }
        let requests = match (&self.requests, self.state) {
            (Some(requests), LoggerState::Running) => requests,
            (_, LoggerState::Closed) => return Err(KvError::LoggerHalted),
            _ => return Err(KvError::NotRunning),
        };
        requests
            .send(PendingWrite { event, ack })
            .map_err(|_| KvError::LoggerHalted)
    }

    /// Receiver for write failures
    ///
    /// At most one error is ever reported; after it the logger is halted.
    pub fn errors(&self) -> Receiver<KvError> {
        self.errors_rx.clone()
    }

    /// True once the writer has stopped after a write failure
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Last sequence number replayed or written
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LoggerState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting writes, drain the queue and sync the file
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        // Dropping the only sender lets the writer finish the queue and exit.
        self.requests = None;

        let mut result = Ok(());
        if let Some(writer) = self.writer.take() {
            result = writer
                .join()
                .map_err(|_| KvError::InvalidState("log writer panicked"))
                .and_then(|synced| synced);
        }
        // An undrained replay stream would block a join forever; the reader
        // exits on its own once its receivers are dropped.
        self.reader = None;
        if self.state == LoggerState::Running {
            self.state = LoggerState::Closed;
        }
        result
    }
}

impl Drop for TransactionLogger {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!("transaction logger shutdown failed: {}", err);
        }
    }
}
