//! Log Recovery
//!
//! Applies a replay stream to the store at startup.

use crossbeam::channel::{Receiver, select};

use crate::error::{KvError, Result};
use crate::store::Store;

use super::{Event, EventType};

/// Result of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of events applied to the store
    pub events_applied: u64,

    /// Of which puts
    pub puts: u64,

    /// Of which deletes
    pub deletes: u64,

    /// Sequence of the last applied event (0 for an empty log)
    pub last_sequence: u64,
}

/// Apply every replayed event to `store`
///
/// Both receivers are drained together: the reader may block sending on
/// either one, so waiting on just one of them can deadlock. The first error
/// received aborts the replay and is returned.
pub fn replay_into(
    store: &Store,
    events: Receiver<Event>,
    errors: Receiver<KvError>,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(event) => apply(store, &event, &mut stats),
                // The reader closes both channels when it stops; an error, if
                // any, is already buffered.
                Err(_) => {
                    return match errors.recv() {
                        Ok(err) => Err(err),
                        Err(_) => Ok(stats),
                    };
                }
            },
            recv(errors) -> msg => match msg {
                Ok(err) => return Err(err),
                Err(_) => {
                    for event in events.iter() {
                        apply(store, &event, &mut stats);
                    }
                    return Ok(stats);
                }
            },
        }
    }
}

fn apply(store: &Store, event: &Event, stats: &mut ReplayStats) {
    store.apply(event);
    stats.events_applied += 1;
    stats.last_sequence = event.sequence;
    match event.event_type {
        EventType::Put => stats.puts += 1,
        EventType::Delete => stats.deletes += 1,
    }
}
