//! Engine contract.
//!
//! The wire protocol lives outside this crate. An engine supplies two
//! implementations: [`Connect`], a factory that establishes and
//! authenticates connections, and [`Transport`], the per-connection
//! protocol operations. The [`Session`](crate::Session) drives both and
//! owns every policy decision above them: deadlines, folder state,
//! reconnection.
//!
//! The split matters: recovery has to manufacture fresh transports for
//! the lifetime of one session value, so the factory cannot be consumed
//! by the first connect.

use std::time::Duration;

use thiserror::Error;

use crate::config::SessionConfig;
use crate::types::{Attachment, Body, Flag, Flags, Header, MessageId, SeqNum, Uid};

/// Errors reported by the protocol engine.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection dropped mid-exchange.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The server announced it is closing the connection.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// The engine's own deadline elapsed.
    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO response.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns true for failures that mean the connection itself is
    /// unusable, as opposed to the server declining one command.
    ///
    /// These are the signals that arm the session's single transparent
    /// reconnect.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionLost(_) | Self::Bye(_))
    }
}

/// Raw message parts handed back by [`Transport::fetch_message`].
///
/// The session's loader assembles these into a
/// [`Message`](crate::Message); engines never derive permitted actions
/// themselves.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Sequence number in the current folder selection.
    pub seq: SeqNum,
    /// Stable unique identifier.
    pub uid: Uid,
    /// Flags at fetch time.
    pub flags: Flags,
    /// Header fields.
    pub header: Header,
    /// Body content.
    pub body: Body,
    /// Attachments, payloads opaque.
    pub attachments: Vec<Attachment>,
}

/// Flag mutation requested through [`Transport::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Add the flag to the message.
    Add(Flag),
    /// Remove the flag from the message.
    Remove(Flag),
}

/// Factory for authenticated connections.
///
/// `connect` must establish the network transport and complete
/// authentication before returning; a transport handed back is in the
/// authenticated state with no folder selected.
#[allow(async_fn_in_trait)] // driven through the concrete Session, not spawned dyn
pub trait Connect {
    /// The transport type this factory produces.
    type Transport: Transport;

    /// Establishes a connection and authenticates.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the transport cannot be
    /// established or the server rejects the credentials.
    async fn connect(&self, config: &SessionConfig) -> Result<Self::Transport, TransportError>;
}

/// Protocol operations on one live connection.
///
/// Implementations do not retry, select folders implicitly, or interpret
/// empty results; all of that is session policy. Every method takes
/// `&mut self` because the protocol allows a single outstanding command
/// per connection.
#[allow(async_fn_in_trait)] // driven through the concrete Session, not spawned dyn
pub trait Transport {
    /// Selects a folder.
    ///
    /// # Errors
    ///
    /// A NO/BAD reply means the server rejected the folder; I/O-class
    /// errors mean the connection failed mid-exchange.
    async fn select(&mut self, folder: &str) -> Result<(), TransportError>;

    /// Lists folder names under the given account reference.
    ///
    /// Returned names may carry the `root` prefix; the caller strips it.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails.
    async fn list_folders(&mut self, root: &str) -> Result<Vec<String>, TransportError>;

    /// Runs a UID search with the given rendered query.
    ///
    /// `None` is the protocol's explicit "no results" signal; by session
    /// policy it is equivalent to `Some(vec![])`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails.
    async fn uid_search(&mut self, query: &str) -> Result<Option<Vec<Uid>>, TransportError>;

    /// Fetches one message by identifier.
    ///
    /// `None` means the identifier does not resolve in the selected
    /// folder (e.g. already expunged).
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails.
    async fn fetch_message(
        &mut self,
        id: MessageId,
    ) -> Result<Option<FetchedMessage>, TransportError>;

    /// Returns the number of messages in the selected folder.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails.
    async fn count_messages(&mut self) -> Result<u32, TransportError>;

    /// Sets or clears one flag on one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails.
    async fn store(&mut self, id: MessageId, action: StoreAction) -> Result<(), TransportError>;

    /// Permanently removes all messages marked `\Deleted` from the
    /// selected folder. Returns the server's success flag.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails.
    async fn expunge(&mut self) -> Result<bool, TransportError>;

    /// Announces a graceful shutdown to the server.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange fails; the session
    /// logs and discards such failures.
    async fn logout(&mut self) -> Result<(), TransportError>;
}
