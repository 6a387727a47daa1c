use crate::options::QueryKinds;
use crate::session::ServerDetails;
use thiserror::Error;
use ue2::CodecError;

/// Why a [`Session::query`](crate::Session::query) call did not produce a
/// result.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Sending a command (or binding the socket) failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A response to this query could not be decoded.
    #[error("malformed response: {0}")]
    Codec(#[from] CodecError),

    /// The deadline passed without a single requested response.
    #[error("no response")]
    NoResponse,

    /// The deadline passed with some kinds missing and the query was
    /// all-or-nothing. `partial` holds what did arrive.
    #[error("incomplete response, missing {missing}")]
    Incomplete {
        missing: QueryKinds,
        partial: Box<ServerDetails>,
    },

    /// The caller's cancellation token fired.
    #[error("query canceled")]
    Canceled,

    /// The query asked for no response kinds at all.
    #[error("nothing to query")]
    NothingRequested,

    /// The session was closed while the query was waiting.
    #[error("session closed")]
    SessionClosed,
}
