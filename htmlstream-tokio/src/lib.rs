//! Tokio glue for `htmlstream`.
//!
//! `htmlstream::RewriteStream` is pull-driven: the engine only runs while the consumer polls.
//! This crate runs the rewrite on its own task instead, which suits servers that hand the output
//! body to another component:
//!
//! - [`spawn_rewrite_pipe`] drains an upstream body into a `StreamAdapter` on a spawned task and
//!   delivers output over a bounded channel.
//! - [`spawn_resource_pipe`] does the same for the body of an `http::Response`, keeping its
//!   metadata.
//!
//! The pump pulls one upstream chunk, forwards the complete output burst it produced, waits until
//! the receiver has taken all of it, and only then pulls again. Every failure reaches the receiver exactly once; the pump task itself has
//! nothing left to report.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use htmlstream::{
    AdapterState, BodyStream, BoxError, ChunkSink, Resource, RewriteEngine, RewriteError,
    StreamAdapter,
};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug)]
pub struct PipeOptions {
    /// Output chunks buffered between the pump and the receiver. Clamped to at least 1.
    ///
    /// With the default of 1, the pump is at most one output chunk ahead of the consumer.
    pub output_capacity: usize,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self { output_capacity: 1 }
    }
}

/// Receiving half of a rewrite pipe.
///
/// Dropping it cancels the pipe: the pump stops pulling and releases the upstream.
#[derive(Debug)]
pub struct RewriteReceiver {
    rx: mpsc::Receiver<Result<Bytes, RewriteError>>,
}

impl RewriteReceiver {
    /// Receive the next output chunk.
    ///
    /// - Returns `None` once the pipe has finished, failed or been terminated by the engine.
    /// - A failure is returned once as `Some(Err(..))`, followed by `None`.
    pub async fn recv(&mut self) -> Option<Result<Bytes, RewriteError>> {
        self.rx.recv().await
    }

    pub fn into_body(self) -> BodyStream {
        Box::pin(self.map(|item| item.map_err(BoxError::from)))
    }
}

impl Stream for RewriteReceiver {
    type Item = Result<Bytes, RewriteError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PumpExit {
    Finished,
    TerminatedByEngine,
    Failed,
    Cancelled,
}

/// Spawn a task that drains `upstream` through a new engine session.
///
/// The session is created before spawning, so a session that cannot be created is reported
/// here rather than through the receiver.
pub fn spawn_rewrite_pipe<E, S, B>(
    engine: &E,
    upstream: S,
    opts: PipeOptions,
) -> Result<RewriteReceiver, RewriteError>
where
    E: RewriteEngine + 'static,
    E::Session<ChunkSink>: Send + 'static,
    S: Stream<Item = Result<B, BoxError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let adapter = StreamAdapter::new(engine)?;
    let (tx, rx) = mpsc::channel(opts.output_capacity.max(1));

    tokio::spawn(async move {
        // Failures already went out through `tx`; the exit reason is only logged.
        let exit = pump(adapter, upstream, tx).await;
        tracing::debug!(?exit, "rewrite pipe finished");
    });

    Ok(RewriteReceiver { rx })
}

/// Rewrite the body of `resource` on a spawned task, keeping its metadata as-is.
///
/// An absent body stays absent and no session or task is created.
pub fn spawn_resource_pipe<E, S, B>(
    engine: &E,
    resource: Resource<S>,
    opts: PipeOptions,
) -> Result<Resource<RewriteReceiver>, RewriteError>
where
    E: RewriteEngine + 'static,
    E::Session<ChunkSink>: Send + 'static,
    S: Stream<Item = Result<B, BoxError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let (parts, body) = resource.into_parts();
    let body = match body {
        Some(body) => Some(spawn_rewrite_pipe(engine, body, opts)?),
        None => None,
    };
    Ok(http::Response::from_parts(parts, body))
}

async fn pump<E, S, B>(
    mut adapter: StreamAdapter<E>,
    mut upstream: S,
    tx: mpsc::Sender<Result<Bytes, RewriteError>>,
) -> PumpExit
where
    E: RewriteEngine,
    S: Stream<Item = Result<B, BoxError>> + Unpin,
    B: AsRef<[u8]>,
{
    loop {
        let next = tokio::select! {
            next = upstream.next() => next,
            _ = tx.closed() => {
                tracing::debug!("receiver dropped; releasing upstream");
                return PumpExit::Cancelled;
            }
        };

        let upstream_done = next.is_none();
        let step = match next {
            Some(Ok(chunk)) => adapter.submit(chunk.as_ref()),
            Some(Err(err)) => {
                adapter.fail();
                Err(RewriteError::Upstream(err))
            }
            None => adapter.finish(),
        };

        let burst = match step {
            Ok(burst) => burst,
            Err(err) => {
                tracing::debug!(error = %err, "rewrite pipe failed");
                // A dropped receiver has nobody left to tell.
                let _ = tx.send(Err(err)).await;
                return PumpExit::Failed;
            }
        };

        for chunk in burst {
            if tx.send(Ok(chunk)).await.is_err() {
                tracing::debug!("receiver dropped mid-burst; releasing upstream");
                return PumpExit::Cancelled;
            }
        }
        // The channel is empty only once the receiver took the whole burst.
        if let Err(_closed) = tx.reserve_many(tx.max_capacity()).await {
            tracing::debug!("receiver dropped before draining the burst; releasing upstream");
            return PumpExit::Cancelled;
        }

        if adapter.state() == AdapterState::Terminated {
            if upstream_done {
                return PumpExit::Finished;
            }
            tracing::debug!("output closed by the engine; releasing upstream");
            return PumpExit::TerminatedByEngine;
        }
    }
}
