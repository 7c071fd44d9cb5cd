//! Session lifecycle management.
//!
//! A [`Session`] owns one connection to one server and the name of the
//! folder that connection has selected. Components never touch the
//! engine without first going through [`Session::ensure_ready`] (or
//! [`Session::ensure_connected`] for folder-free operations), which is
//! idempotent: when the transport is live and the right folder is
//! selected it issues no wire traffic at all.
//!
//! ## Recovery policy
//!
//! The failing operation itself is the liveness check. There is no
//! NOOP round trip before commands. When an exchange fails with a
//! disconnect-class error, the session tears the transport down,
//! reconnects and re-selects exactly once, and retries the exchange
//! exactly once. A second consecutive failure surfaces as
//! [`Error::Connection`]. An elapsed command deadline instead tears the
//! session down and surfaces [`Error::Timeout`] immediately; the next
//! operation's `ensure_ready` performs the reconnect.

use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::timeout;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::transport::{Connect, FetchedMessage, StoreAction, Transport, TransportError};
use crate::types::{MessageId, Uid};

/// Outcome of one wire attempt, before deadline and staleness
/// classification.
type Attempt<T> = std::result::Result<std::result::Result<T, TransportError>, Elapsed>;

/// A stateful connection to one server.
///
/// Created empty; the first `ensure_ready` connects, authenticates and
/// selects. All operations take `&mut self`: the protocol allows one
/// outstanding command per connection, and the borrow checker is the
/// mutual exclusion.
pub struct Session<C: Connect> {
    config: SessionConfig,
    connector: C,
    transport: Option<C::Transport>,
    /// Folder the live transport has selected. `None` while
    /// disconnected or authenticated-but-unselected. Always mirrors the
    /// wire: set only after a successful SELECT, cleared by a rejected
    /// one.
    selected: Option<String>,
}

impl<C: Connect> Session<C> {
    /// Creates a disconnected session.
    ///
    /// No I/O happens here; the first operation connects.
    #[must_use]
    pub const fn new(config: SessionConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            transport: None,
            selected: None,
        }
    }

    /// Returns true if a transport is currently held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns the folder the live connection
    /// has selected, if any.
    #[must_use]
    pub fn selected_folder(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Guarantees the transport is connected and `folder` is selected.
    ///
    /// Disconnected: connects, authenticates and selects. Connected on a
    /// different folder: re-selects only, which is cheaper than a
    /// reconnect; if the connection turns out to be dead mid-select, one
    /// fresh connect+select is attempted before giving up. Connected on
    /// the requested folder: a no-op with no wire traffic.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] when the transport cannot be established or
    /// authentication is rejected, [`Error::FolderSelect`] when the
    /// server rejects the folder, [`Error::Timeout`] when a deadline
    /// elapses mid-handshake.
    pub async fn ensure_ready(&mut self, folder: &str) -> Result<()> {
        if self.transport.is_some() {
            if self.selected.as_deref() == Some(folder) {
                return Ok(());
            }
            tracing::debug!(from = ?self.selected, to = folder, "Switching folder");
            match self.select_on_wire(folder).await {
                Err(Error::Connection(cause)) => {
                    tracing::warn!(error = %cause, folder, "Connection died during re-select; reconnecting once");
                }
                other => return other,
            }
        }
        self.establish().await?;
        self.select_on_wire(folder).await
    }

    /// The folder-free half of [`ensure_ready`](Self::ensure_ready):
    /// guarantees a connected, authenticated transport without selecting
    /// anything. Used for folder listing.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] when the transport cannot be established or
    /// authentication is rejected.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Ok(());
        }
        self.establish().await
    }

    /// Returns the live transport handle for direct protocol calls.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] if called before `ensure_ready` or
    /// `ensure_connected` has succeeded. That is a bug in the calling
    /// component, not a recoverable condition.
    pub fn transport(&mut self) -> Result<&mut C::Transport> {
        self.transport
            .as_mut()
            .ok_or(Error::NotReady("no live transport; call ensure_ready first"))
    }

    /// Logs out best-effort and releases the transport.
    ///
    /// Idempotent; safe to call when already disconnected. Logout
    /// failures are logged and discarded, never surfaced.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match timeout(self.config.command_timeout, transport.logout()).await {
                Ok(Ok(())) => tracing::debug!("Logged out"),
                Ok(Err(e)) => tracing::debug!(error = %e, "Logout failed; dropping connection"),
                Err(_) => tracing::debug!("Logout timed out; dropping connection"),
            }
        }
        self.selected = None;
    }

    // === Protocol operations (one critical section each) ===
    //
    // Every operation below runs: precondition, attempt under the
    // command deadline, then at most one reconnect-and-retry when the
    // first attempt died with the connection.

    /// Runs a UID search in `folder` with an already rendered query.
    pub(crate) async fn uid_search(
        &mut self,
        folder: &str,
        query: &str,
    ) -> Result<Option<Vec<Uid>>> {
        self.ensure_ready(folder).await?;
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.uid_search(query)).await;
        match self.classify(attempt, deadline)? {
            Ok(hits) => Ok(hits),
            Err(cause) => {
                self.recover(folder, &cause).await?;
                let attempt = timeout(deadline, self.transport()?.uid_search(query)).await;
                match self.classify(attempt, deadline)? {
                    Ok(hits) => Ok(hits),
                    Err(repeat) => Err(Error::Connection(repeat)),
                }
            }
        }
    }

    /// Fetches one message from `folder` by identifier.
    pub(crate) async fn fetch_message(
        &mut self,
        folder: &str,
        id: MessageId,
    ) -> Result<Option<FetchedMessage>> {
        self.ensure_ready(folder).await?;
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.fetch_message(id)).await;
        match self.classify(attempt, deadline)? {
            Ok(fetched) => Ok(fetched),
            Err(cause) => {
                self.recover(folder, &cause).await?;
                let attempt = timeout(deadline, self.transport()?.fetch_message(id)).await;
                match self.classify(attempt, deadline)? {
                    Ok(fetched) => Ok(fetched),
                    Err(repeat) => Err(Error::Connection(repeat)),
                }
            }
        }
    }

    /// Returns the server-reported message count for `folder`.
    pub(crate) async fn count_messages(&mut self, folder: &str) -> Result<u32> {
        self.ensure_ready(folder).await?;
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.count_messages()).await;
        match self.classify(attempt, deadline)? {
            Ok(count) => Ok(count),
            Err(cause) => {
                self.recover(folder, &cause).await?;
                let attempt = timeout(deadline, self.transport()?.count_messages()).await;
                match self.classify(attempt, deadline)? {
                    Ok(count) => Ok(count),
                    Err(repeat) => Err(Error::Connection(repeat)),
                }
            }
        }
    }

    /// Sets or clears one flag on one message in `folder`.
    pub(crate) async fn store(
        &mut self,
        folder: &str,
        id: MessageId,
        action: StoreAction,
    ) -> Result<()> {
        self.ensure_ready(folder).await?;
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.store(id, action.clone())).await;
        match self.classify(attempt, deadline)? {
            Ok(()) => Ok(()),
            Err(cause) => {
                self.recover(folder, &cause).await?;
                let attempt = timeout(deadline, self.transport()?.store(id, action)).await;
                match self.classify(attempt, deadline)? {
                    Ok(()) => Ok(()),
                    Err(repeat) => Err(Error::Connection(repeat)),
                }
            }
        }
    }

    /// Expunges messages marked `\Deleted` in `folder`.
    pub(crate) async fn expunge(&mut self, folder: &str) -> Result<bool> {
        self.ensure_ready(folder).await?;
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.expunge()).await;
        let ok = match self.classify(attempt, deadline)? {
            Ok(ok) => ok,
            Err(cause) => {
                self.recover(folder, &cause).await?;
                let attempt = timeout(deadline, self.transport()?.expunge()).await;
                match self.classify(attempt, deadline)? {
                    Ok(ok) => ok,
                    Err(repeat) => return Err(Error::Connection(repeat)),
                }
            }
        };
        tracing::debug!(folder, ok, "Expunge completed");
        Ok(ok)
    }

    /// Lists folder names under this session's account reference, with
    /// the reference prefix still attached.
    pub(crate) async fn list_folders(&mut self) -> Result<Vec<String>> {
        self.ensure_connected().await?;
        let root = self.config.server_ref();
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.list_folders(&root)).await;
        match self.classify(attempt, deadline)? {
            Ok(names) => Ok(names),
            Err(cause) => {
                tracing::warn!(error = %cause, "Connection went stale during folder listing; reconnecting once");
                self.ensure_connected().await?;
                let attempt = timeout(deadline, self.transport()?.list_folders(&root)).await;
                match self.classify(attempt, deadline)? {
                    Ok(names) => Ok(names),
                    Err(repeat) => Err(Error::Connection(repeat)),
                }
            }
        }
    }

    // === Private helpers ===

    /// Connects and authenticates a fresh transport under the connect
    /// deadline. The new transport has no folder selected.
    async fn establish(&mut self) -> Result<()> {
        tracing::info!(host = %self.config.host, port = self.config.port, "Connecting to server");
        let attempt = timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.config),
        )
        .await;
        match attempt {
            Err(_) => {
                tracing::warn!("Connection attempt timed out");
                Err(Error::Connection(TransportError::Timeout(
                    self.config.connect_timeout,
                )))
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Connection attempt failed");
                Err(Error::Connection(e))
            }
            Ok(Ok(transport)) => {
                self.transport = Some(transport);
                self.selected = None;
                tracing::info!("Connected and authenticated");
                Ok(())
            }
        }
    }

    /// Issues one SELECT and records the folder on success. A rejected
    /// SELECT leaves no folder selected on the wire, so the recorded
    /// folder is cleared; a disconnect-class failure tears the session
    /// down and reports [`Error::Connection`] for the caller's retry
    /// decision.
    async fn select_on_wire(&mut self, folder: &str) -> Result<()> {
        let deadline = self.config.command_timeout;
        let attempt = timeout(deadline, self.transport()?.select(folder)).await;
        match attempt {
            Err(_) => {
                self.teardown("select deadline elapsed");
                Err(Error::Timeout(deadline))
            }
            Ok(Ok(())) => {
                self.selected = Some(folder.to_owned());
                tracing::debug!(folder, "Folder selected");
                Ok(())
            }
            Ok(Err(e)) if e.is_disconnect() => {
                self.teardown("transport failed during select");
                Err(Error::Connection(e))
            }
            Ok(Err(e)) => {
                self.selected = None;
                Err(Error::FolderSelect {
                    folder: folder.to_owned(),
                    source: e,
                })
            }
        }
    }

    /// Classifies one attempt's outcome. An elapsed deadline tears the
    /// session down and errors out with [`Error::Timeout`]; engine
    /// failures other than disconnects propagate unchanged; a
    /// disconnect-class failure tears the session down and comes back as
    /// `Ok(Err(cause))` so the caller can decide whether the transparent
    /// reconnect is still available.
    fn classify<T>(
        &mut self,
        attempt: Attempt<T>,
        deadline: Duration,
    ) -> Result<std::result::Result<T, TransportError>> {
        match attempt {
            Err(_) => {
                self.teardown("command deadline elapsed");
                Err(Error::Timeout(deadline))
            }
            Ok(Ok(value)) => Ok(Ok(value)),
            Ok(Err(e)) if e.is_disconnect() => {
                self.teardown("transport reported a broken connection");
                Ok(Err(e))
            }
            Ok(Err(e)) => Err(Error::Transport(e)),
        }
    }

    /// The single transparent reconnect between the two attempts of one
    /// operation.
    async fn recover(&mut self, folder: &str, cause: &TransportError) -> Result<()> {
        tracing::warn!(error = %cause, folder, "Connection went stale mid-operation; reconnecting once");
        self.ensure_ready(folder).await
    }

    /// Drops the transport without a logout exchange. Used when the
    /// connection is known or suspected broken.
    fn teardown(&mut self, reason: &'static str) {
        if self.transport.take().is_some() {
            tracing::warn!(reason, "Tearing down session");
        }
        self.selected = None;
    }
}

impl<C: Connect> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("connected", &self.is_connected())
            .field("selected_folder", &self.selected)
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
    use crate::testing::ScriptedEngine;

    fn config() -> SessionConfig {
        SessionConfig::new("imap.test").credentials("user@test", "hunter2")
    }

    #[tokio::test]
    async fn ensure_ready_connects_authenticates_and_selects() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());

        assert!(!session.is_connected());
        session.ensure_ready("INBOX").await.unwrap();

        assert!(session.is_connected());
        assert_eq!(session.selected_folder(), Some("INBOX"));
        let (connects, selects) = engine.script(|s| (s.connects, s.selects.clone()));
        assert_eq!(connects, 1);
        assert_eq!(selects, vec!["INBOX"]);
    }

    #[tokio::test]
    async fn repeated_ensure_ready_issues_no_wire_traffic() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());

        session.ensure_ready("INBOX").await.unwrap();
        session.ensure_ready("INBOX").await.unwrap();
        session.ensure_ready("INBOX").await.unwrap();

        let (connects, selects) = engine.script(|s| (s.connects, s.selects.len()));
        assert_eq!(connects, 1);
        assert_eq!(selects, 1);
    }

    #[tokio::test]
    async fn switching_folders_reselects_without_reconnecting() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());

        session.ensure_ready("INBOX").await.unwrap();
        session.ensure_ready("Archive").await.unwrap();

        assert_eq!(session.selected_folder(), Some("Archive"));
        let (connects, selects) = engine.script(|s| (s.connects, s.selects.clone()));
        assert_eq!(connects, 1);
        assert_eq!(selects, vec!["INBOX", "Archive"]);
    }

    #[tokio::test]
    async fn dead_connection_during_folder_switch_reconnects_once() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| {
            s.failures
                .push_back(TransportError::ConnectionLost("reset by peer".into()));
        });

        session.ensure_ready("Archive").await.unwrap();

        assert_eq!(session.selected_folder(), Some("Archive"));
        // The switch is attempted on the dead transport, then again on
        // the fresh one
        let (connects, selects) = engine.script(|s| (s.connects, s.selects.clone()));
        assert_eq!(connects, 2);
        assert_eq!(selects, vec!["INBOX", "Archive", "Archive"]);
    }

    #[tokio::test]
    async fn folder_switch_failing_twice_surfaces_connection_error() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| {
            s.failures
                .push_back(TransportError::ConnectionLost("reset".into()));
            s.failures
                .push_back(TransportError::ConnectionLost("reset again".into()));
        });

        let err = session.ensure_ready("Archive").await.unwrap_err();

        assert!(matches!(err, Error::Connection(_)));
        assert!(!session.is_connected());
        assert_eq!(session.selected_folder(), None);
        assert_eq!(engine.script(|s| s.connects), 2);
    }

    #[tokio::test]
    async fn rejected_select_clears_recorded_folder_but_keeps_transport() {
        let engine = ScriptedEngine::new();
        engine.script(|s| s.reject_selects.push("Restricted".into()));
        let mut session = Session::new(config(), engine.clone());

        session.ensure_ready("INBOX").await.unwrap();
        let err = session.ensure_ready("Restricted").await.unwrap_err();

        assert!(matches!(err, Error::FolderSelect { ref folder, .. } if folder == "Restricted"));
        assert!(session.is_connected());
        assert_eq!(session.selected_folder(), None);
        assert_eq!(engine.script(|s| s.connects), 1);
    }

    #[tokio::test]
    async fn connect_failure_surfaces_connection_error() {
        let engine = ScriptedEngine::new();
        engine.script(|s| s.connect_failures = 1);
        let mut session = Session::new(config(), engine.clone());

        let err = session.ensure_ready("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn stale_connection_triggers_exactly_one_reconnect() {
        let engine = ScriptedEngine::new();
        engine.script(|s| s.count = 7);
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| {
            s.failures
                .push_back(TransportError::ConnectionLost("reset by peer".into()));
        });

        let count = session.count_messages("INBOX").await.unwrap();
        assert_eq!(count, 7);

        // Initial connect plus the one transparent reconnect
        let (connects, selects) = engine.script(|s| (s.connects, s.selects.clone()));
        assert_eq!(connects, 2);
        assert_eq!(selects, vec!["INBOX", "INBOX"]);
    }

    #[tokio::test]
    async fn second_consecutive_failure_surfaces_connection_error() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_connected().await.unwrap();

        // Folder listing has no SELECT in its reconnect path, so both
        // injected failures land on the listing exchange itself.
        engine.script(|s| {
            s.failures
                .push_back(TransportError::ConnectionLost("reset".into()));
            s.failures
                .push_back(TransportError::ConnectionLost("reset again".into()));
        });

        let err = session.list_folders().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(!session.is_connected());
        // No silent third attempt
        assert_eq!(engine.script(|s| s.connects), 2);
    }

    #[tokio::test]
    async fn failed_reconnect_surfaces_connection_error() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| {
            s.failures
                .push_back(TransportError::ConnectionLost("reset".into()));
            s.connect_failures = 1;
        });

        let err = session.count_messages("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(!session.is_connected());

        // The outage has cleared; the next operation reconnects fresh.
        let count = session.count_messages("INBOX").await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(engine.script(|s| s.connects), 3);
    }

    #[tokio::test]
    async fn non_disconnect_engine_errors_propagate_without_retry() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| {
            s.failures
                .push_back(TransportError::Bad("unknown command".into()));
        });

        let err = session.count_messages("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Bad(_))));
        // The connection is still considered fine
        assert!(session.is_connected());
        assert_eq!(engine.script(|s| s.connects), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_tears_down_and_surfaces_timeout() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| s.hangs = 1);

        let err = session.count_messages("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(!session.is_connected());
        // Timeouts do not consume the transparent reconnect
        assert_eq!(engine.script(|s| s.connects), 1);

        // The next operation reconnects and re-selects
        let count = session.count_messages("INBOX").await.unwrap();
        assert_eq!(count, 0);
        let (connects, selects) = engine.script(|s| (s.connects, s.selects.len()));
        assert_eq!(connects, 2);
        assert_eq!(selects, 2);
    }

    #[tokio::test]
    async fn transport_before_ready_is_a_usage_error() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine);
        assert!(matches!(session.transport(), Err(Error::NotReady(_))));
    }

    #[tokio::test]
    async fn disconnect_logs_out_and_is_idempotent() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        session.disconnect().await;
        assert!(!session.is_connected());
        assert_eq!(session.selected_folder(), None);

        session.disconnect().await;
        assert_eq!(engine.script(|s| s.logouts), 1);
    }

    #[tokio::test]
    async fn disconnect_swallows_logout_failures() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine.clone());
        session.ensure_ready("INBOX").await.unwrap();

        engine.script(|s| {
            s.failures
                .push_back(TransportError::ConnectionLost("gone".into()));
        });

        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn debug_output_redacts_the_transport() {
        let engine = ScriptedEngine::new();
        let mut session = Session::new(config(), engine);
        session.ensure_ready("INBOX").await.unwrap();
        let rendered = format!("{session:?}");
        assert!(rendered.contains("imap.test"));
        assert!(rendered.contains("INBOX"));
    }
}
