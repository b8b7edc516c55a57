use futures::Stream;

use crate::engine::RewriteEngine;
use crate::error::{BoxError, Result};
use crate::stream::RewriteStream;

/// A body plus pass-through metadata. `None` is an absent body.
///
/// Status, headers, version and extensions are metadata and are never inspected here.
pub type Resource<B> = http::Response<Option<B>>;

/// Rewrite the body of `resource`, keeping its metadata as-is.
///
/// An absent body stays absent and no engine session is created for it.
pub fn wrap_resource<E, S, B>(
    engine: &E,
    resource: Resource<S>,
) -> Result<Resource<RewriteStream<E, S>>>
where
    E: RewriteEngine,
    S: Stream<Item = std::result::Result<B, BoxError>> + Unpin,
    B: AsRef<[u8]>,
{
    let (parts, body) = resource.into_parts();
    let body = match body {
        Some(body) => Some(RewriteStream::new(engine, body)?),
        None => {
            tracing::trace!("resource has no body; nothing to rewrite");
            None
        }
    };
    Ok(http::Response::from_parts(parts, body))
}
