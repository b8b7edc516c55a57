use thiserror::Error;

use crate::adapter::AdapterState;

/// Boxed error used at the engine and upstream boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RewriteError {
    /// The value handed to the dispatcher is neither text, a stream, nor a resource.
    #[error("unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    /// The upstream body failed while it was being drained into the engine.
    #[error("upstream body failed: {0}")]
    Upstream(#[source] BoxError),

    /// The rewriting engine rejected a `write`, `end` or full-buffer transform.
    #[error("rewriting engine failed: {0}")]
    Engine(#[source] BoxError),

    #[error("cannot {operation} while the adapter is {state:?}")]
    InvalidState {
        state: AdapterState,
        operation: &'static str,
    },
}

impl RewriteError {
    pub(crate) fn engine<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RewriteError::Engine(Box::new(err))
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, RewriteError::Upstream(_))
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, RewriteError::Engine(_))
    }
}

pub type Result<T> = std::result::Result<T, RewriteError>;
