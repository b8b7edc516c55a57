use std::any::Any;

use futures::Stream;

use crate::engine::RewriteEngine;
use crate::error::{BoxError, Result, RewriteError};
use crate::resource::{Resource, wrap_resource};
use crate::stream::RewriteStream;

/// The input kinds the dispatcher understands.
pub enum RewriteInput<S> {
    /// A fully materialized document, rewritten in one call.
    Text(String),
    /// A body stream, rewritten incrementally.
    Stream(S),
    /// A body plus metadata; the body is rewritten incrementally, the metadata passes through.
    Resource(Resource<S>),
}

/// Output of [`rewrite`]; mirrors the input kind.
pub enum RewriteOutput<E: RewriteEngine, S> {
    Text(String),
    Stream(RewriteStream<E, S>),
    Resource(Resource<RewriteStream<E, S>>),
}

impl<S: 'static> RewriteInput<S> {
    /// Classify an opaque value received from the surrounding runtime.
    ///
    /// `String` and `&'static str` are text, `S` is a stream and `http::Response<Option<S>>` is a
    /// resource. Anything else is [`RewriteError::UnsupportedInputKind`].
    pub fn from_any(value: Box<dyn Any + Send>) -> Result<Self> {
        let value = match value.downcast::<String>() {
            Ok(text) => return Ok(RewriteInput::Text(*text)),
            Err(value) => value,
        };
        let value = match value.downcast::<&'static str>() {
            Ok(text) => return Ok(RewriteInput::Text((*text).to_string())),
            Err(value) => value,
        };
        let value = match value.downcast::<S>() {
            Ok(stream) => return Ok(RewriteInput::Stream(*stream)),
            Err(value) => value,
        };
        match value.downcast::<Resource<S>>() {
            Ok(resource) => Ok(RewriteInput::Resource(*resource)),
            Err(_) => Err(RewriteError::UnsupportedInputKind(format!(
                "expected text, `{}` or a response carrying it",
                std::any::type_name::<S>()
            ))),
        }
    }
}

impl<S> From<String> for RewriteInput<S> {
    fn from(text: String) -> Self {
        RewriteInput::Text(text)
    }
}

impl<S> From<&str> for RewriteInput<S> {
    fn from(text: &str) -> Self {
        RewriteInput::Text(text.to_string())
    }
}

impl<S> From<Resource<S>> for RewriteInput<S> {
    fn from(resource: Resource<S>) -> Self {
        RewriteInput::Resource(resource)
    }
}

impl<E: RewriteEngine, S> RewriteOutput<E, S> {
    pub fn into_text(self) -> Option<String> {
        match self {
            RewriteOutput::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<RewriteStream<E, S>> {
        match self {
            RewriteOutput::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource<RewriteStream<E, S>>> {
        match self {
            RewriteOutput::Resource(resource) => Some(resource),
            _ => None,
        }
    }
}

/// Route `input` to the full-buffer transform, a [`RewriteStream`] or [`wrap_resource`].
pub fn rewrite<E, S, B>(engine: &E, input: RewriteInput<S>) -> Result<RewriteOutput<E, S>>
where
    E: RewriteEngine,
    S: Stream<Item = std::result::Result<B, BoxError>> + Unpin,
    B: AsRef<[u8]>,
{
    match input {
        RewriteInput::Text(text) => {
            let out = engine.transform_full(&text).map_err(RewriteError::engine)?;
            Ok(RewriteOutput::Text(out))
        }
        RewriteInput::Stream(stream) => {
            Ok(RewriteOutput::Stream(RewriteStream::new(engine, stream)?))
        }
        RewriteInput::Resource(resource) => {
            Ok(RewriteOutput::Resource(wrap_resource(engine, resource)?))
        }
    }
}

/// [`RewriteInput::from_any`] followed by [`rewrite`].
pub fn rewrite_any<E, S, B>(engine: &E, value: Box<dyn Any + Send>) -> Result<RewriteOutput<E, S>>
where
    E: RewriteEngine,
    S: Stream<Item = std::result::Result<B, BoxError>> + Unpin + 'static,
    B: AsRef<[u8]>,
{
    rewrite(engine, RewriteInput::<S>::from_any(value)?)
}
