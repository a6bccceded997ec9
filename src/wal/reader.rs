//! Log Reader
//!
//! Reads events from the transaction log front to back, validating that
//! sequence numbers strictly increase.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver};

use crate::error::{KvError, Result};

use super::Event;

/// Reads events from a transaction log
pub struct LogReader<R: BufRead> {
    reader: R,

    /// 1-based number of the last line read
    line: u64,

    /// Last sequence accepted; shared so the writer continues from it
    last_sequence: Arc<AtomicU64>,

    buf: Vec<u8>,

    /// Set after end of file or the first error
    finished: bool,
}

impl LogReader<BufReader<File>> {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), Arc::new(AtomicU64::new(0))))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(reader: R, last_sequence: Arc<AtomicU64>) -> Self {
        Self {
            reader,
            line: 0,
            last_sequence,
            buf: Vec::new(),
            finished: false,
        }
    }

    /// Read the next event from the log
    ///
    /// Returns `Ok(None)` at end of file. After an error the reader is
    /// finished and keeps returning `Ok(None)`.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_event();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_event(&mut self) -> Result<Option<Event>> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(KvError::ReadFailure)?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;

        let record = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
        let event = Event::decode_bytes(record).map_err(|source| KvError::Parse {
            line: self.line,
            source,
        })?;

        let previous = self.last_sequence.load(Ordering::Acquire);
        if event.sequence <= previous {
            return Err(KvError::OutOfOrder {
                line: self.line,
                previous,
                found: event.sequence,
            });
        }
        self.last_sequence.store(event.sequence, Ordering::Release);

        Ok(Some(event))
    }

    /// Last sequence number accepted so far
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line
    }

    /// Iterate over events, stopping after the first error
    pub fn events(self) -> LogIterator<R> {
        LogIterator { reader: self }
    }
}

impl<R: BufRead + Send + 'static> LogReader<R> {
    /// Stream events from a worker thread
    ///
    /// Events arrive in file order on the first receiver. Any error is sent
    /// once on the second receiver, after which both channels close. A clean
    /// end of file closes both channels with no error.
    pub fn spawn(
        self,
        capacity: usize,
    ) -> io::Result<(Receiver<Event>, Receiver<KvError>, JoinHandle<()>)> {
        let (events_tx, events_rx) = bounded(capacity);
        let (errors_tx, errors_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("kvlog-replay".to_string())
            .spawn(move || {
                for item in self.events() {
                    match item {
                        Ok(event) => {
                            if events_tx.send(event).is_err() {
                                tracing::debug!("replay consumer went away");
                                return;
                            }
                        }
                        Err(err) => {
                            if let Err(unsent) = errors_tx.send(err) {
                                tracing::error!("no listener for replay error: {}", unsent.0);
                            }
                            return;
                        }
                    }
                }
            })?;

        Ok((events_rx, errors_rx, handle))
    }
}

/// Iterator over log events
pub struct LogIterator<R: BufRead> {
    reader: LogReader<R>,
}

impl<R: BufRead> Iterator for LogIterator<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_event().transpose()
    }
}
