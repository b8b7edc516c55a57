//! Bridge a push-style incremental rewriting engine into pull-driven byte streams.
//!
//! A rewriting engine (for example an HTML rewriter) is fed bytes with a synchronous `write`
//! call and reports output by invoking a sink zero or more times per call. Async consumers want
//! the opposite: they ask for the next output chunk and expect the producer to be asked for more
//! input only when they are ready for it.
//!
//! - [`StreamAdapter`] owns one engine session and turns each input chunk into its ordered
//!   output burst.
//! - [`RewriteStream`] drives a `StreamAdapter` from an upstream body as a `futures::Stream`.
//! - [`wrap_resource`] rewrites the body of an `http::Response` and keeps its metadata.
//! - [`rewrite`] routes text, streams and resources to the matching path.
//!
//! This crate is runtime-agnostic. For a spawned pump on tokio, see `htmlstream-tokio`.

pub mod adapter;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod resource;
pub mod sink;
pub mod stream;

#[cfg(feature = "lol-html")]
pub mod adapters;

pub use adapter::*;
pub use dispatch::*;
pub use engine::*;
pub use error::*;
pub use resource::*;
pub use sink::*;
pub use stream::*;
