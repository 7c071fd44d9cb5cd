//! # postroom-imap
//!
//! A client-side mailbox abstraction over IMAP: select a folder, search
//! it, fetch and flag messages, expunge, all through one stable handle
//! that manages the connection underneath.
//!
//! ## Features
//!
//! - **Transparent reconnection**: every operation guarantees its own
//!   connectivity; a connection dropped between calls costs one silent
//!   reconnect-and-retry, never an error
//! - **Idempotent readiness**: `ensure_ready` connects, authenticates
//!   and selects only what is actually missing; repeated calls on a
//!   live selection issue no wire traffic
//! - **UID-based search cursors**: search results are captured as stable
//!   identifiers, so a cursor stays valid across flag changes, expunges
//!   and even disconnects
//! - **Typed search criteria**: composable [`SearchQuery`] values render
//!   to the protocol's search grammar, with a raw escape hatch
//! - **Engine-agnostic**: the wire protocol lives behind the [`Connect`]
//!   and [`Transport`] traits; the library owns policy (deadlines,
//!   retries, folder state), the engine owns parsing and I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use postroom_imap::{Mailbox, SearchQuery, Session, SessionConfig, SortOrder};
//!
//! #[tokio::main]
//! async fn main() -> postroom_imap::Result<()> {
//!     let config = SessionConfig::builder("imap.example.com")
//!         .credentials("user@example.com", "password")
//!         .build();
//!     // TlsEngine: your implementation of the `Connect` trait
//!     let mut mailbox = Mailbox::new(Session::new(config, TlsEngine::new()));
//!
//!     // Pick a folder; the protocol SELECT happens lazily
//!     mailbox.select_folder("INBOX").await?;
//!     println!("{} messages", mailbox.count().await?);
//!
//!     // Newest first, as stable UIDs
//!     for uid in mailbox.search(&SearchQuery::Unseen, SortOrder::NewestFirst).await? {
//!         let message = mailbox.message(uid).await?;
//!         println!("{:?}", message.header.subject);
//!         mailbox.mark_seen(uid).await?;
//!     }
//!
//!     // Deletion is two-phase: mark, then expunge
//!     mailbox.expunge().await?;
//!     mailbox.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Disconnected │ ── ensure_ready ──→│   Selected   │
//! └──────────────┘                    └──────────────┘
//!        ↑        disconnect / timeout /      │
//!        └──── second consecutive failure ────┘
//! ```
//!
//! A broken connection is detected by the failing operation itself,
//! not by a liveness check. The operation that hit the failure
//! reconnects and retries once; if that also fails, the session reverts
//! to disconnected and the error surfaces.
//!
//! ## Modules
//!
//! - [`transport`]: the engine contract ([`Connect`], [`Transport`])
//! - [`types`]: identifiers, flags, message model

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod catalog;
mod config;
mod cursor;
mod error;
mod loader;
mod mailbox;
mod search;
mod session;
#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;
pub mod transport;
pub mod types;

pub use config::{DEFAULT_TLS_PORT, SessionConfig, SessionConfigBuilder};
pub use cursor::{SearchCursor, SortOrder};
pub use error::{Error, Result};
pub use mailbox::Mailbox;
pub use search::SearchQuery;
pub use session::Session;
pub use transport::{Connect, FetchedMessage, StoreAction, Transport, TransportError};
pub use types::{Action, Attachment, Body, Flag, Flags, Header, Message, MessageId, SeqNum, Uid};
