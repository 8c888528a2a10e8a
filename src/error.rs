//! Error types shared by both engines

use thiserror::Error;

use crate::state::StateInstance;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while initializing, querying, or dispatching a
/// state machine
#[derive(Error, Debug)]
pub enum Error {
    /// A structurally malformed call: empty or oversized table, cyclic parent
    /// links, an out-of-range initial or target instance, or dispatching an
    /// uninitialized machine. Detected before any state mutation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A well-formed but out-of-range instance passed to a query operation.
    /// Read-only; the machine is left untouched.
    #[error("invalid data: no state at instance {0}")]
    InvalidData(StateInstance),

    /// A handler or the transducer signaled failure mid-dispatch. The
    /// machine's `current`/`processing` fields may already reflect a partial
    /// transition; the caller decides whether to re-`init`.
    #[error("fault in state {0}: {1}")]
    Fault(StateInstance, String),
}
