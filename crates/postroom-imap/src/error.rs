//! Error types for the mailbox library.

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;
use crate::types::MessageId;

/// Errors surfaced by mailbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be established, authentication was
    /// rejected, or the single transparent reconnect attempt failed too.
    ///
    /// Not retried internally beyond that one attempt; the caller may
    /// retry the whole operation.
    #[error("Connection failed: {0}")]
    Connection(#[source] TransportError),

    /// The command deadline elapsed. The session has been torn down and
    /// the next operation will reconnect.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The folder name is not present in the server's folder list.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The server rejected selection of the folder.
    #[error("Folder {folder:?} rejected by server")]
    FolderSelect {
        /// The folder that was rejected.
        folder: String,
        /// The server's reply.
        #[source]
        source: TransportError,
    },

    /// No folder has been selected yet; call
    /// [`select_folder`](crate::Mailbox::select_folder) first.
    #[error("No folder selected")]
    NoFolderSelected,

    /// The identifier no longer resolves to a message (e.g. it was
    /// expunged, possibly by another session).
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// A transport handle was requested before the session was ready.
    /// Indicates a bug in the calling component, not a recoverable
    /// condition.
    #[error("Session not ready: {0}")]
    NotReady(&'static str),

    /// Any other engine failure, propagated unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
