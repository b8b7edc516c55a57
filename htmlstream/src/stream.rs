use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::adapter::{AdapterState, StreamAdapter};
use crate::engine::RewriteEngine;
use crate::error::{BoxError, Result, RewriteError};
use crate::sink::ChunkSink;

/// A boxed body stream, the common currency for bodies handed across API boundaries.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BoxError>> + Send>>;

/// Pull-driven rewrite of an upstream body.
///
/// The upstream is polled only once every output chunk produced by the previous input chunk has
/// been handed to the consumer, so at most one input chunk is in flight.
///
/// - An upstream error is yielded once as [`RewriteError::Upstream`], then the stream ends.
/// - An engine error is yielded once as [`RewriteError::Engine`], then the stream ends.
/// - After the engine's termination sentinel the upstream is dropped unpolled.
///
/// Dropping the stream cancels the rewrite; the upstream and the session are dropped quietly.
pub struct RewriteStream<E: RewriteEngine, S> {
    adapter: StreamAdapter<E>,
    upstream: Option<S>,
    pending: VecDeque<Bytes>,
    done: bool,
}

impl<E, S, B> RewriteStream<E, S>
where
    E: RewriteEngine,
    S: Stream<Item = std::result::Result<B, BoxError>> + Unpin,
    B: AsRef<[u8]>,
{
    pub fn new(engine: &E, upstream: S) -> Result<Self> {
        Ok(Self::with_adapter(StreamAdapter::new(engine)?, upstream))
    }

    pub fn with_adapter(adapter: StreamAdapter<E>, upstream: S) -> Self {
        Self {
            adapter,
            upstream: Some(upstream),
            pending: VecDeque::new(),
            done: false,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.adapter.state()
    }

    /// Box this stream as a [`BodyStream`].
    pub fn into_body(self) -> BodyStream
    where
        E::Session<ChunkSink>: Send + 'static,
        S: Send + 'static,
        E: 'static,
        B: 'static,
    {
        Box::pin(self.map(|item| item.map_err(BoxError::from)))
    }

    fn stop(&mut self) {
        self.upstream = None;
        self.done = true;
    }
}

impl<E, S, B> Stream for RewriteStream<E, S>
where
    E: RewriteEngine,
    S: Stream<Item = std::result::Result<B, BoxError>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if this.done {
                return Poll::Ready(None);
            }
            if this.adapter.state() == AdapterState::Terminated {
                tracing::debug!("output closed by the engine; releasing upstream");
                this.stop();
                continue;
            }
            let Some(upstream) = this.upstream.as_mut() else {
                this.done = true;
                continue;
            };

            let step = match ready!(upstream.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => this.adapter.submit(chunk.as_ref()),
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "upstream body failed");
                    this.adapter.fail();
                    this.stop();
                    return Poll::Ready(Some(Err(RewriteError::Upstream(err))));
                }
                None => {
                    this.upstream = None;
                    this.adapter.finish()
                }
            };

            match step {
                Ok(burst) => this.pending.extend(burst),
                Err(err) => {
                    this.stop();
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}
