/// Receives output produced by an engine session.
///
/// An empty chunk is the termination sentinel: the session will not produce more output.
/// Implementations must not assume `chunk` stays valid after the call returns.
pub trait OutputSink {
    fn handle_chunk(&mut self, chunk: &[u8]);
}

impl<F> OutputSink for F
where
    F: FnMut(&[u8]),
{
    fn handle_chunk(&mut self, chunk: &[u8]) {
        self(chunk)
    }
}

/// One incremental rewriting pass, bound to a sink at creation.
///
/// Calls are synchronous and never reentrant. Both `write` and `end` may invoke the sink zero or
/// more times before returning.
pub trait RewriteSession {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write(&mut self, chunk: &[u8]) -> Result<(), Self::Error>;

    /// Flush buffered input. No `write` follows a successful or failed `end`.
    fn end(&mut self) -> Result<(), Self::Error>;
}

/// Factory for engine sessions plus the one-shot full-buffer path.
pub trait RewriteEngine {
    type Error: std::error::Error + Send + Sync + 'static;
    type Session<S: OutputSink>: RewriteSession<Error = Self::Error>;

    fn new_session<S: OutputSink>(&self, sink: S) -> Result<Self::Session<S>, Self::Error>;

    fn transform_full(&self, input: &str) -> Result<String, Self::Error>;
}

