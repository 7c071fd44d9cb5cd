//! Mailbox façade.
//!
//! [`Mailbox`] ties the session, the folder catalog, the search cursor
//! and the message loader together behind one handle. Every operation
//! that touches the wire first routes through the session's
//! `ensure_ready`, so callers never see connection management: a
//! dropped connection costs one transparently retried exchange, not an
//! error.

use crate::catalog::FolderCatalog;
use crate::cursor::{SearchCursor, SortOrder};
use crate::error::{Error, Result};
use crate::loader;
use crate::search::SearchQuery;
use crate::session::Session;
use crate::transport::{Connect, StoreAction};
use crate::types::{Flag, Message, MessageId};

/// One mailbox on one server.
///
/// Owns its [`Session`] and is therefore `&mut` for every operation: the
/// protocol allows a single outstanding command per connection. For
/// concurrency across folders or accounts, create one `Mailbox` per
/// connection; they share nothing but their configuration values.
///
/// ```no_run
/// use postroom_imap::{Connect, Mailbox, Result, SearchQuery, Session, SessionConfig, SortOrder};
///
/// async fn sweep(engine: impl Connect) -> Result<()> {
///     let config = SessionConfig::new("imap.example.com")
///         .credentials("user@example.com", "s3cret");
///     let mut mailbox = Mailbox::new(Session::new(config, engine));
///
///     mailbox.select_folder("INBOX").await?;
///     for uid in mailbox.search(&SearchQuery::Unseen, SortOrder::NewestFirst).await? {
///         let message = mailbox.message(uid).await?;
///         println!("{}", message.header.subject.as_deref().unwrap_or("(no subject)"));
///         mailbox.mark_seen(uid).await?;
///     }
///     mailbox.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct Mailbox<C: Connect> {
    session: Session<C>,
    catalog: FolderCatalog,
    /// Folder operations run against. Recorded by `select_folder`;
    /// selected on the wire lazily by the next operation.
    folder: Option<String>,
}

impl<C: Connect> Mailbox<C> {
    /// Creates a mailbox over `session`. No I/O happens until the
    /// first operation.
    #[must_use]
    pub const fn new(session: Session<C>) -> Self {
        Self {
            session,
            catalog: FolderCatalog::new(),
            folder: None,
        }
    }

    /// Records `folder` as the folder subsequent operations run
    /// against, validating it against the server's folder list first.
    ///
    /// Validation uses the catalog, so only the first call costs a
    /// listing round trip. The protocol-level folder selection is
    /// deferred to the next operation; a mailbox can switch recorded
    /// folders freely without wire traffic. Returns `&mut Self` for
    /// chaining.
    ///
    /// # Errors
    ///
    /// [`Error::FolderNotFound`] when the server does not list `folder`;
    /// the previously recorded folder stays active. Connection failures
    /// during catalog population surface as [`Error::Connection`].
    pub async fn select_folder(&mut self, folder: &str) -> Result<&mut Self> {
        self.catalog.list(&mut self.session).await?;
        if !self.catalog.contains(folder) {
            return Err(Error::FolderNotFound(folder.to_owned()));
        }
        self.folder = Some(folder.to_owned());
        tracing::debug!(folder, "Active folder recorded");
        Ok(self)
    }

    /// Returns the active folder name, if one has been selected.
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// Returns the server's folder names, without the account-reference
    /// prefix.
    ///
    /// The first call queries the server; later calls reuse the cached
    /// list. Requires connectivity but no selected folder.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] when the session cannot reach the server.
    pub async fn folders(&mut self) -> Result<&[String]> {
        self.catalog.list(&mut self.session).await
    }

    /// Clears the cached folder list so the next listing or selection
    /// re-queries the server. For callers that create or delete folders
    /// through other channels; nothing in this crate calls it.
    pub fn invalidate_folders(&mut self) {
        self.catalog.invalidate();
    }

    /// Returns the server-reported message count for the active folder.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] before the first `select_folder`;
    /// connection and folder-selection failures per
    /// [`ensure_ready`](Session::ensure_ready).
    pub async fn count(&mut self) -> Result<u32> {
        let folder = self.active()?;
        self.session.count_messages(&folder).await
    }

    /// Returns a cursor over every message in the active folder, most
    /// recently arrived first.
    ///
    /// Shorthand for [`search`](Self::search) with
    /// [`SearchQuery::All`] and [`SortOrder::NewestFirst`].
    ///
    /// # Errors
    ///
    /// As for [`search`](Self::search).
    pub async fn messages(&mut self) -> Result<SearchCursor> {
        self.search(&SearchQuery::All, SortOrder::NewestFirst).await
    }

    /// Runs `query` against the active folder and returns a cursor over
    /// the matching identifiers in the requested order.
    ///
    /// The cursor captures UIDs, not sequence numbers, so it stays
    /// meaningful across flag changes and expunges, and it holds no
    /// connection state. Iterate it as often and as late as you like.
    /// Zero matches, including the engine's explicit no-results signal,
    /// yield an empty cursor rather than an error.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] before the first `select_folder`;
    /// connection and folder-selection failures per
    /// [`ensure_ready`](Session::ensure_ready).
    pub async fn search(&mut self, query: &SearchQuery, order: SortOrder) -> Result<SearchCursor> {
        let folder = self.active()?;
        let hits = self.session.uid_search(&folder, &query.to_string()).await?;
        let uids = hits.unwrap_or_default();
        Ok(SearchCursor::new(folder, uids, order))
    }

    /// Fetches one message by sequence number or UID and assembles it.
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`] when the identifier does not resolve
    /// in the active folder (for example, already expunged);
    /// [`Error::NoFolderSelected`] before the first `select_folder`.
    pub async fn message(&mut self, id: impl Into<MessageId>) -> Result<Message> {
        let folder = self.active()?;
        loader::load(&mut self.session, &folder, id.into()).await
    }

    /// Marks one message `\Deleted`.
    ///
    /// The message stays in the folder until [`expunge`](Self::expunge)
    /// removes it permanently.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] before the first `select_folder`;
    /// engine rejections surface as [`Error::Transport`].
    pub async fn delete(&mut self, id: impl Into<MessageId>) -> Result<()> {
        let folder = self.active()?;
        self.session
            .store(&folder, id.into(), StoreAction::Add(Flag::Deleted))
            .await
    }

    /// Sets `\Seen` on one message.
    ///
    /// # Errors
    ///
    /// As for [`delete`](Self::delete).
    pub async fn mark_seen(&mut self, id: impl Into<MessageId>) -> Result<()> {
        let folder = self.active()?;
        self.session
            .store(&folder, id.into(), StoreAction::Add(Flag::Seen))
            .await
    }

    /// Clears `\Seen` on one message.
    ///
    /// # Errors
    ///
    /// As for [`delete`](Self::delete).
    pub async fn mark_unseen(&mut self, id: impl Into<MessageId>) -> Result<()> {
        let folder = self.active()?;
        self.session
            .store(&folder, id.into(), StoreAction::Remove(Flag::Seen))
            .await
    }

    /// Permanently removes every message marked `\Deleted` from the
    /// active folder. Returns the engine's success flag.
    ///
    /// Sequence numbers of the remaining messages may shift after this
    /// call; identifiers captured as UIDs (search cursors) stay valid.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] before the first `select_folder`;
    /// connection and folder-selection failures per
    /// [`ensure_ready`](Session::ensure_ready).
    pub async fn expunge(&mut self) -> Result<bool> {
        let folder = self.active()?;
        self.session.expunge(&folder).await
    }

    /// Logs out best-effort and releases the connection. Idempotent.
    ///
    /// The mailbox stays usable: the next operation reconnects.
    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
    }

    fn active(&self) -> Result<String> {
        self.folder.clone().ok_or(Error::NoFolderSelected)
    }
}

impl<C: Connect> std::fmt::Debug for Mailbox<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("folder", &self.folder)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::testing::ScriptedEngine;
    use crate::transport::{FetchedMessage, TransportError};
    use crate::types::{Body, Flags, Header, SeqNum, Uid};
    use std::num::NonZeroU32;

    fn uid(n: u32) -> Uid {
        Uid(NonZeroU32::new(n).unwrap())
    }

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&n| uid(n)).collect()
    }

    fn mailbox(engine: &ScriptedEngine) -> Mailbox<ScriptedEngine> {
        let config = SessionConfig::new("imap.test").credentials("user@test", "hunter2");
        Mailbox::new(Session::new(config, engine.clone()))
    }

    fn inboxed(engine: &ScriptedEngine) -> Mailbox<ScriptedEngine> {
        engine.script(|s| {
            if s.folders.is_empty() {
                s.folders = vec!["INBOX".into()];
            }
        });
        mailbox(engine)
    }

    fn fetched(n: u32) -> FetchedMessage {
        FetchedMessage {
            seq: SeqNum(NonZeroU32::new(1).unwrap()),
            uid: uid(n),
            flags: Flags::new(),
            header: Header {
                subject: Some("Hello".into()),
                ..Header::default()
            },
            body: Body {
                text: Some("World".into()),
                html: None,
            },
            attachments: Vec::new(),
        }
    }

    mod folder_selection {
        use super::*;

        #[tokio::test]
        async fn select_validates_and_defers_the_wire_select() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.folders = vec!["INBOX".into(), "Archive".into()]);
            let mut mailbox = mailbox(&engine);

            mailbox.select_folder("Archive").await.unwrap();

            assert_eq!(mailbox.folder(), Some("Archive"));
            // Validation listed folders but never selected one
            let (lists, selects) = engine.script(|s| (s.lists, s.selects.len()));
            assert_eq!(lists, 1);
            assert_eq!(selects, 0);
        }

        #[tokio::test]
        async fn unknown_folder_fails_and_keeps_the_active_folder() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let err = mailbox.select_folder("Nope").await.unwrap_err();
            assert!(matches!(err, Error::FolderNotFound(ref name) if name == "Nope"));
            assert_eq!(mailbox.folder(), Some("INBOX"));
        }

        #[tokio::test]
        async fn selection_chains_into_operations() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.count = 4);
            let mut mailbox = inboxed(&engine);

            let count = mailbox
                .select_folder("INBOX")
                .await
                .unwrap()
                .count()
                .await
                .unwrap();

            assert_eq!(count, 4);
            // The wire select happened at count time, not at selection
            assert_eq!(engine.script(|s| s.selects.clone()), vec!["INBOX"]);
        }

        #[tokio::test]
        async fn switching_recorded_folders_is_free_until_used() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.folders = vec!["INBOX".into(), "Archive".into()]);
            let mut mailbox = mailbox(&engine);

            mailbox.select_folder("INBOX").await.unwrap();
            mailbox.select_folder("Archive").await.unwrap();
            mailbox.select_folder("INBOX").await.unwrap();

            assert_eq!(engine.script(|s| s.selects.len()), 0);
        }

        #[tokio::test]
        async fn operations_without_a_selection_fail() {
            let engine = ScriptedEngine::new();
            let mut mailbox = mailbox(&engine);

            assert!(matches!(mailbox.count().await, Err(Error::NoFolderSelected)));
            assert!(matches!(
                mailbox.messages().await,
                Err(Error::NoFolderSelected)
            ));
            assert!(matches!(
                mailbox.expunge().await,
                Err(Error::NoFolderSelected)
            ));
            assert!(matches!(
                mailbox.message(uid(1)).await,
                Err(Error::NoFolderSelected)
            ));
        }

        #[tokio::test]
        async fn folders_lists_without_selecting() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.folders = vec!["INBOX".into(), "Sent".into()]);
            let mut mailbox = mailbox(&engine);

            let names = mailbox.folders().await.unwrap();
            assert_eq!(names, ["INBOX", "Sent"]);
            assert_eq!(engine.script(|s| s.selects.len()), 0);
        }

        #[tokio::test]
        async fn invalidate_folders_forces_a_requery() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);

            mailbox.folders().await.unwrap();
            engine.script(|s| s.folders.push("Archive".into()));

            mailbox.invalidate_folders();
            let names = mailbox.folders().await.unwrap();
            assert_eq!(names, ["INBOX", "Archive"]);
            assert_eq!(engine.script(|s| s.lists), 2);
        }
    }

    mod searching {
        use super::*;
        use proptest::prelude::*;

        #[tokio::test]
        async fn messages_returns_newest_first() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.search_replies.push_back(Some(vec![1, 2, 3])));
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let cursor = mailbox.messages().await.unwrap();

            assert_eq!(cursor.uids(), uids(&[3, 2, 1]));
            assert_eq!(engine.script(|s| s.searches.clone()), vec!["ALL"]);
        }

        #[tokio::test]
        async fn oldest_first_keeps_the_server_order() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.search_replies.push_back(Some(vec![1, 2, 3])));
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let cursor = mailbox
                .search(&SearchQuery::All, SortOrder::OldestFirst)
                .await
                .unwrap();

            assert_eq!(cursor.uids(), uids(&[1, 2, 3]));
        }

        #[tokio::test]
        async fn no_results_in_either_form_is_an_empty_cursor_not_an_error() {
            let engine = ScriptedEngine::new();
            engine.script(|s| {
                s.search_replies.push_back(None);
                s.search_replies.push_back(Some(vec![]));
            });
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let explicit = mailbox.messages().await.unwrap();
            assert!(explicit.is_empty());
            assert_eq!(explicit.iter().count(), 0);

            let empty = mailbox.messages().await.unwrap();
            assert!(empty.is_empty());
        }

        #[tokio::test]
        async fn typed_queries_render_to_the_wire_grammar() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let query = SearchQuery::And(vec![
                SearchQuery::Unseen,
                SearchQuery::Subject("weekly report".into()),
            ]);
            mailbox.search(&query, SortOrder::NewestFirst).await.unwrap();

            assert_eq!(
                engine.script(|s| s.searches.clone()),
                vec!["UNSEEN SUBJECT \"weekly report\""]
            );
        }

        #[tokio::test]
        async fn cursor_outlives_the_connection() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.search_replies.push_back(Some(vec![5, 6])));
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let cursor = mailbox.messages().await.unwrap();
            mailbox.disconnect().await;

            assert_eq!(cursor.folder(), "INBOX");
            assert_eq!(cursor.iter().collect::<Vec<_>>(), uids(&[6, 5]));
        }

        proptest! {
            /// Flipping the sort order reverses the identifier list and
            /// never changes its membership.
            #[test]
            fn newest_first_is_the_reversal_of_oldest_first(
                raw in prop::collection::vec(1u32..100_000, 0..64)
            ) {
                tokio_test::block_on(async {
                    let engine = ScriptedEngine::new();
                    engine.script(|s| {
                        s.folders = vec!["INBOX".into()];
                        s.search_replies.push_back(Some(raw.clone()));
                        s.search_replies.push_back(Some(raw.clone()));
                    });
                    let mut mailbox = mailbox(&engine);
                    mailbox.select_folder("INBOX").await.unwrap();

                    let newest = mailbox
                        .search(&SearchQuery::All, SortOrder::NewestFirst)
                        .await
                        .unwrap();
                    let oldest = mailbox
                        .search(&SearchQuery::All, SortOrder::OldestFirst)
                        .await
                        .unwrap();

                    let mut flipped = newest.uids().to_vec();
                    flipped.reverse();
                    assert_eq!(flipped, oldest.uids());
                });
            }
        }
    }

    mod messages {
        use super::*;

        #[tokio::test]
        async fn message_fetches_and_assembles() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.fetch_replies.push_back(Some(fetched(301))));
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let message = mailbox.message(uid(301)).await.unwrap();

            assert_eq!(message.uid, uid(301));
            assert_eq!(message.header.subject.as_deref(), Some("Hello"));
            assert_eq!(engine.script(|s| s.fetches.clone()), vec!["uid 301"]);
        }

        #[tokio::test]
        async fn missing_message_surfaces_not_found() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            let err = mailbox.message(uid(999)).await.unwrap_err();
            assert!(matches!(err, Error::MessageNotFound(MessageId::Uid(u)) if u == uid(999)));
        }

        #[tokio::test]
        async fn delete_marks_without_expunging() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            mailbox.delete(uid(301)).await.unwrap();

            let (stores, expunges) = engine.script(|s| (s.stores.clone(), s.expunges));
            assert_eq!(
                stores,
                vec![("uid 301".to_owned(), StoreAction::Add(Flag::Deleted))]
            );
            assert_eq!(expunges, 0);
        }

        #[tokio::test]
        async fn seen_flag_round_trip() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            mailbox.mark_seen(uid(7)).await.unwrap();
            mailbox.mark_unseen(uid(7)).await.unwrap();

            assert_eq!(
                engine.script(|s| s.stores.clone()),
                vec![
                    ("uid 7".to_owned(), StoreAction::Add(Flag::Seen)),
                    ("uid 7".to_owned(), StoreAction::Remove(Flag::Seen)),
                ]
            );
        }

        #[tokio::test]
        async fn expunge_reports_the_engine_flag() {
            let engine = ScriptedEngine::new();
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();

            assert!(mailbox.expunge().await.unwrap());

            engine.script(|s| s.expunge_reply = false);
            assert!(!mailbox.expunge().await.unwrap());
            assert_eq!(engine.script(|s| s.expunges), 2);
        }
    }

    mod resilience {
        use super::*;

        #[tokio::test]
        async fn a_dropped_connection_costs_one_retry_not_an_error() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.count = 9);
            let mut mailbox = inboxed(&engine);
            mailbox.select_folder("INBOX").await.unwrap();
            assert_eq!(mailbox.count().await.unwrap(), 9);

            engine.script(|s| {
                s.failures
                    .push_back(TransportError::ConnectionLost("poof".into()));
            });

            assert_eq!(mailbox.count().await.unwrap(), 9);
            assert_eq!(engine.script(|s| s.connects), 2);
        }

        #[tokio::test]
        async fn disconnect_then_reuse_reconnects() {
            let engine = ScriptedEngine::new();
            engine.script(|s| s.count = 2);
            let mut mailbox = inboxed(&engine);

            mailbox.select_folder("INBOX").await.unwrap();
            assert_eq!(mailbox.count().await.unwrap(), 2);

            mailbox.disconnect().await;
            assert_eq!(mailbox.count().await.unwrap(), 2);

            let (connects, logouts) = engine.script(|s| (s.connects, s.logouts));
            assert_eq!(connects, 2);
            assert_eq!(logouts, 1);
        }
    }
}
