//! Log Writer
//!
//! Background worker that appends pending events to the transaction log.
//!
//! A single worker owns the file, so sequence numbers are assigned in the
//! exact order requests were enqueued. Each event is applied to the store
//! only after its record has been written.

use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender};

use crate::config::SyncStrategy;
use crate::error::{KvError, Result};
use crate::store::Store;

use super::Event;

/// Destination for encoded records
pub trait LogSink: Write + Send + 'static {
    /// Force written records to stable storage
    fn sync(&mut self) -> io::Result<()>;
}

impl LogSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// A mutation waiting for the writer, with an optional acknowledgement
/// that receives the assigned sequence number once the event is durable
/// and visible in the store.
pub(crate) struct PendingWrite {
    pub(crate) event: Event,
    pub(crate) ack: Option<Sender<Result<u64>>>,
}

/// Appends events to a log sink
pub struct LogWriter<S: LogSink> {
    sink: S,
    sync_strategy: SyncStrategy,

    /// Shared with the reader: replay leaves the last sequence seen here
    last_sequence: Arc<AtomicU64>,

    /// Records written since the last sync
    unsynced: usize,

    /// Reused encode buffer
    buf: String,
}

impl<S: LogSink> LogWriter<S> {
    pub fn new(sink: S, sync_strategy: SyncStrategy, last_sequence: Arc<AtomicU64>) -> Self {
        Self {
            sink,
            sync_strategy,
            last_sequence,
            unsynced: 0,
            buf: String::new(),
        }
    }

    /// Append an event, assigning it the next sequence number
    ///
    /// Returns the event as written. On failure the sequence number is not
    /// consumed. Fails with [`KvError::SequenceExhausted`] once the last
    /// sequence is `u64::MAX`.
    pub fn append(&mut self, event: Event) -> Result<Event> {
        let last = self.last_sequence.load(Ordering::Acquire);
        let sequence = last
            .checked_add(1)
            .ok_or(KvError::SequenceExhausted { last })?;
        let event = event.with_sequence(sequence);

        self.buf.clear();
        event.encode_into(&mut self.buf);

        self.sink
            .write_all(self.buf.as_bytes())
            .and_then(|()| self.sink.flush())
            .map_err(|source| KvError::WriteFailure { sequence, source })?;

        self.last_sequence.store(sequence, Ordering::Release);
        self.unsynced += 1;

        if self.sync_strategy.should_sync(self.unsynced) {
            self.sync()?;
        }

        Ok(event)
    }

    /// Force sync of every appended record
    pub fn sync(&mut self) -> Result<()> {
        if self.unsynced == 0 {
            return Ok(());
        }
        self.sink.sync().map_err(|source| KvError::WriteFailure {
            sequence: self.current_sequence(),
            source,
        })?;
        self.unsynced = 0;
        Ok(())
    }

    /// The last sequence number written
    pub fn current_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Start the worker thread
    ///
    /// The worker exits when every request sender is dropped (returning the
    /// result of the final sync) or after the first write failure, which is
    /// reported once on `errors`.
    pub(crate) fn spawn(
        self,
        store: Arc<Store>,
        requests: Receiver<PendingWrite>,
        errors: Sender<KvError>,
        halted: Arc<AtomicBool>,
    ) -> io::Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name("kvlog-writer".to_string())
            .spawn(move || self.run(store, requests, errors, halted))
    }

    fn run(
        mut self,
        store: Arc<Store>,
        requests: Receiver<PendingWrite>,
        errors: Sender<KvError>,
        halted: Arc<AtomicBool>,
    ) -> Result<()> {
        for request in requests.iter() {
            match self.append(request.event) {
                Ok(event) => {
                    store.apply(&event);
                    tracing::trace!("appended {}", event);
                    if let Some(ack) = request.ack {
                        let _ = ack.send(Ok(event.sequence));
                    }
                }
                Err(err) => {
                    halted.store(true, Ordering::Release);
                    tracing::error!("log writer halted: {}", err);

                    if let Some(ack) = request.ack {
                        let _ = ack.send(Err(KvError::LoggerHalted));
                    }
                    for queued in requests.try_iter() {
                        if let Some(ack) = queued.ack {
                            let _ = ack.send(Err(KvError::LoggerHalted));
                        }
                    }
                    if let Err(unsent) = errors.send(err) {
                        tracing::error!("no listener for log writer error: {}", unsent.0);
                    }
                    return Ok(());
                }
            }
        }

        tracing::debug!(last_sequence = self.current_sequence(), "log writer stopping");
        self.sync()
    }
}
