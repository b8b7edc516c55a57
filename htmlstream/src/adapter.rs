use bytes::Bytes;

use crate::engine::{RewriteEngine, RewriteSession};
use crate::error::{Result, RewriteError};
use crate::sink::{ChunkSink, SinkHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Session created, no input accepted yet.
    Idle,
    /// At least one input chunk was accepted.
    Active,
    /// Output side closed, either by `finish` or by the engine's termination sentinel.
    Terminated,
    /// The engine or the upstream failed.
    Errored,
}

impl AdapterState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AdapterState::Terminated | AdapterState::Errored)
    }
}

/// Owns one engine session and turns input chunks into ordered output bursts.
///
/// Each call returns exactly the output the engine produced during that call, in emission order.
/// Callers forward a burst completely before submitting the next chunk; that is the whole
/// backpressure contract at this layer.
///
/// The session is dropped as soon as the adapter reaches a terminal state.
pub struct StreamAdapter<E: RewriteEngine> {
    session: Option<Box<E::Session<ChunkSink>>>,
    sink: SinkHandle,
    state: AdapterState,
}

impl<E: RewriteEngine> StreamAdapter<E> {
    pub fn new(engine: &E) -> Result<Self> {
        let (sink, handle) = ChunkSink::pair();
        let session = engine.new_session(sink).map_err(RewriteError::engine)?;
        tracing::debug!("rewrite session created");
        Ok(Self {
            session: Some(Box::new(session)),
            sink: handle,
            state: AdapterState::Idle,
        })
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Engine emissions dropped because they arrived after the termination sentinel.
    pub fn discarded_after_termination(&self) -> usize {
        self.sink.discarded_after_termination()
    }

    /// Write one input chunk and return the output it produced.
    ///
    /// If the engine emits the termination sentinel during this call, the output that preceded
    /// the sentinel is still returned and the adapter becomes [`AdapterState::Terminated`].
    pub fn submit(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        let result = self.live_session("submit")?.write(chunk);
        tracing::trace!(bytes = chunk.len(), "submitted input chunk");
        let burst = self.settle(result)?;
        if self.state == AdapterState::Idle {
            self.transition(AdapterState::Active);
        }
        Ok(burst)
    }

    /// Flush the engine and close the output side.
    pub fn finish(&mut self) -> Result<Vec<Bytes>> {
        let result = self.live_session("finish")?.end();
        let burst = self.settle(result)?;
        if !self.state.is_terminal() {
            self.close(AdapterState::Terminated);
        }
        Ok(burst)
    }

    /// Record that the upstream feeding this adapter failed.
    ///
    /// The adapter reports nothing itself; the caller forwards the upstream error.
    pub fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.close(AdapterState::Errored);
    }

    fn live_session(&mut self, operation: &'static str) -> Result<&mut E::Session<ChunkSink>> {
        if self.state.is_terminal() {
            return Err(RewriteError::InvalidState {
                state: self.state,
                operation,
            });
        }
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(RewriteError::InvalidState {
                state: self.state,
                operation,
            }),
        }
    }

    fn settle(&mut self, result: std::result::Result<(), E::Error>) -> Result<Vec<Bytes>> {
        if let Err(err) = result {
            self.sink.drain();
            self.close(AdapterState::Errored);
            return Err(RewriteError::engine(err));
        }
        let burst = self.sink.drain();
        if self.sink.is_terminated() {
            self.close(AdapterState::Terminated);
        }
        Ok(burst)
    }

    fn close(&mut self, state: AdapterState) {
        self.session = None;
        self.transition(state);
    }

    fn transition(&mut self, state: AdapterState) {
        tracing::debug!(from = ?self.state, to = ?state, "adapter state");
        self.state = state;
    }
}
