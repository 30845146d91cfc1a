//! Gapless playback scheduling and barge-in cancellation
//!
//! Inbound synthesized chunks arrive in pieces; the scheduler lines each
//! decoded unit up to start exactly where the previous one ends on the
//! output clock, so discrete chunks play as one continuous utterance.
//! An interrupt hard-stops everything and rewinds the timeline to "now".

use crate::audio::output::{HandleId, OutputSink, PlaybackUnit, ScheduledHandle};
use crate::codec::{decode_chunk, EncodedChunk};
use crate::constants::{CHANNELS, PLAYBACK_SAMPLE_RATE};
use crate::error::Error;

/// Owns the playback timeline and the set of live handles.
///
/// Only the session event loop calls into this type, one event at a
/// time; `next_start` and the active set are never touched elsewhere.
pub struct PlaybackScheduler {
    sink: Box<dyn OutputSink>,
    /// End of the last scheduled unit on the sink clock
    next_start: f64,
    /// Units that will play or are playing
    active: Vec<Box<dyn ScheduledHandle>>,
}

impl PlaybackScheduler {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self {
            sink,
            next_start: 0.0,
            active: Vec::new(),
        }
    }

    /// Decode an inbound chunk and schedule it directly after whatever
    /// is already queued.
    ///
    /// A chunk that fails to decode is dropped without touching the
    /// timeline; later chunks are unaffected.
    pub fn enqueue(&mut self, chunk: &EncodedChunk) -> Result<(), Error> {
        let channels = decode_chunk(chunk, CHANNELS)?;
        let unit = PlaybackUnit::new(channels, PLAYBACK_SAMPLE_RATE);
        let duration = unit.duration_secs();

        let start_at = self.next_start.max(self.sink.now());
        let handle = self.sink.schedule(unit, start_at)?;
        self.active.push(handle);
        self.next_start = start_at + duration;

        tracing::trace!(
            start_at,
            duration,
            active = self.active.len(),
            "scheduled playback unit"
        );
        Ok(())
    }

    /// Natural completion of one unit: drop its handle, nothing else.
    pub fn on_finished(&mut self, id: HandleId) {
        self.active.retain(|h| h.id() != id);
    }

    /// Barge-in: hard-stop every live unit, empty the active set and
    /// rewind the timeline so the next unit schedules at "now".
    ///
    /// Also used at teardown to clear pending playback. Safe to call
    /// with nothing active.
    pub fn cancel_all(&mut self) {
        for handle in self.active.drain(..) {
            handle.stop();
        }
        self.next_start = 0.0;
    }

    /// Number of units that will play or are playing
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// End of the last scheduled unit, in seconds on the sink clock
    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}
