use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::engine::OutputSink;

#[derive(Debug, Default)]
struct SinkState {
    queue: VecDeque<Bytes>,
    terminated: bool,
    discarded: usize,
}

/// The sink handed to an engine session.
///
/// Every non-empty emission is copied into an owned [`Bytes`] and queued in emission order. The
/// first empty emission closes the sink; anything after it is discarded.
///
/// The only way to obtain a `ChunkSink` is [`ChunkSink::pair`], which also returns the
/// [`SinkHandle`] the owning adapter drains.
#[derive(Debug)]
pub struct ChunkSink {
    state: Arc<Mutex<SinkState>>,
}

/// Adapter-side view of a [`ChunkSink`].
#[derive(Debug)]
pub struct SinkHandle {
    state: Arc<Mutex<SinkState>>,
}

impl ChunkSink {
    pub fn pair() -> (ChunkSink, SinkHandle) {
        let state = Arc::new(Mutex::new(SinkState::default()));
        (
            ChunkSink {
                state: Arc::clone(&state),
            },
            SinkHandle { state },
        )
    }
}

fn lock(state: &Mutex<SinkState>) -> MutexGuard<'_, SinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OutputSink for ChunkSink {
    fn handle_chunk(&mut self, chunk: &[u8]) {
        let mut state = lock(&self.state);
        if state.terminated {
            state.discarded += 1;
            if state.discarded == 1 {
                tracing::warn!(
                    bytes = chunk.len(),
                    "engine emitted output after the termination sentinel; discarding"
                );
            }
            return;
        }
        if chunk.is_empty() {
            tracing::trace!("termination sentinel received");
            state.terminated = true;
            return;
        }
        tracing::trace!(bytes = chunk.len(), "engine output");
        state.queue.push_back(Bytes::copy_from_slice(chunk));
    }
}

impl SinkHandle {
    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<Bytes> {
        lock(&self.state).queue.drain(..).collect()
    }

    pub fn is_terminated(&self) -> bool {
        lock(&self.state).terminated
    }

    /// Number of emissions dropped because they arrived after the sentinel.
    pub fn discarded_after_termination(&self) -> usize {
        lock(&self.state).discarded
    }
}
