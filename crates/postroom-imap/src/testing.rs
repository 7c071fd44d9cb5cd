//! Scripted engine for unit tests.
//!
//! [`ScriptedEngine`] implements [`Connect`] over a shared [`Script`]:
//! tests arrange canned replies and failure injections up front, run the
//! code under test, then assert on the recorded call log. Cloning the
//! engine clones the handle, not the script, so a test keeps visibility
//! into transports the session creates internally during reconnects.

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use crate::config::SessionConfig;
use crate::transport::{Connect, FetchedMessage, StoreAction, Transport, TransportError};
use crate::types::{MessageId, Uid};

/// Canned replies, failure injections and the call log, shared by an
/// engine and every transport it has produced.
#[derive(Debug)]
pub struct Script {
    /// Folder names returned by listing, without the account reference;
    /// the transport prepends the requested root to each.
    pub folders: Vec<String>,
    /// Reply for message counting.
    pub count: u32,
    /// Replies for searches, consumed front to back. `None` entries
    /// model the engine's explicit no-results signal. An empty queue
    /// replies with zero hits.
    pub search_replies: VecDeque<Option<Vec<u32>>>,
    /// Replies for fetches, consumed front to back. An empty queue
    /// replies with `None`.
    pub fetch_replies: VecDeque<Option<FetchedMessage>>,
    /// Success flag returned by expunge.
    pub expunge_reply: bool,
    /// Folder names the transport rejects with a NO on select.
    pub reject_selects: Vec<String>,
    /// Number of upcoming connect attempts that fail.
    pub connect_failures: usize,
    /// Failures injected into upcoming exchanges, consumed front to
    /// back. Each exchange checks this queue before replying.
    pub failures: VecDeque<TransportError>,
    /// Number of upcoming exchanges that never complete, for exercising
    /// deadlines.
    pub hangs: usize,

    /// Connect attempts, successful or not.
    pub connects: usize,
    /// Folders passed to select, in call order.
    pub selects: Vec<String>,
    /// Completed folder listings.
    pub lists: usize,
    /// Rendered queries passed to search, in call order.
    pub searches: Vec<String>,
    /// Rendered identifiers passed to fetch, in call order.
    pub fetches: Vec<String>,
    /// Identifier and action for each store call, in call order.
    pub stores: Vec<(String, StoreAction)>,
    /// Completed expunge exchanges.
    pub expunges: usize,
    /// Logout attempts, successful or not.
    pub logouts: usize,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            count: 0,
            search_replies: VecDeque::new(),
            fetch_replies: VecDeque::new(),
            expunge_reply: true,
            reject_selects: Vec::new(),
            connect_failures: 0,
            failures: VecDeque::new(),
            hangs: 0,
            connects: 0,
            selects: Vec::new(),
            lists: 0,
            searches: Vec::new(),
            fetches: Vec::new(),
            stores: Vec::new(),
            expunges: 0,
            logouts: 0,
        }
    }
}

/// Connection factory over a shared [`Script`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    /// Creates an engine with an empty script: connects succeed,
    /// searches find nothing, fetches resolve nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the script locked, for arranging replies and
    /// asserting on the call log.
    pub fn script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        f(&mut self.script.lock().unwrap())
    }
}

impl Connect for ScriptedEngine {
    type Transport = ScriptedTransport;

    async fn connect(&self, _config: &SessionConfig) -> Result<Self::Transport, TransportError> {
        let mut s = self.script.lock().unwrap();
        s.connects += 1;
        if s.connect_failures > 0 {
            s.connect_failures -= 1;
            return Err(TransportError::ConnectionLost(
                "scripted connect failure".into(),
            ));
        }
        Ok(ScriptedTransport {
            script: Arc::clone(&self.script),
        })
    }
}

/// One scripted connection.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Failure and hang injection point shared by every exchange.
    async fn gate(&self) -> Result<(), TransportError> {
        let hang = {
            let mut s = self.script.lock().unwrap();
            if let Some(e) = s.failures.pop_front() {
                return Err(e);
            }
            if s.hangs > 0 {
                s.hangs -= 1;
                true
            } else {
                false
            }
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    async fn select(&mut self, folder: &str) -> Result<(), TransportError> {
        self.script.lock().unwrap().selects.push(folder.to_owned());
        self.gate().await?;
        let s = self.script.lock().unwrap();
        if s.reject_selects.iter().any(|f| f == folder) {
            return Err(TransportError::No(format!("cannot select {folder}")));
        }
        Ok(())
    }

    async fn list_folders(&mut self, root: &str) -> Result<Vec<String>, TransportError> {
        self.gate().await?;
        let mut s = self.script.lock().unwrap();
        s.lists += 1;
        Ok(s.folders.iter().map(|name| format!("{root}{name}")).collect())
    }

    async fn uid_search(&mut self, query: &str) -> Result<Option<Vec<Uid>>, TransportError> {
        self.script.lock().unwrap().searches.push(query.to_owned());
        self.gate().await?;
        let mut s = self.script.lock().unwrap();
        let reply = s.search_replies.pop_front().unwrap_or_else(|| Some(Vec::new()));
        Ok(reply.map(|raw| raw.into_iter().filter_map(NonZeroU32::new).map(Uid).collect()))
    }

    async fn fetch_message(
        &mut self,
        id: MessageId,
    ) -> Result<Option<FetchedMessage>, TransportError> {
        self.script.lock().unwrap().fetches.push(id.to_string());
        self.gate().await?;
        let mut s = self.script.lock().unwrap();
        Ok(s.fetch_replies.pop_front().flatten())
    }

    async fn count_messages(&mut self) -> Result<u32, TransportError> {
        self.gate().await?;
        Ok(self.script.lock().unwrap().count)
    }

    async fn store(&mut self, id: MessageId, action: StoreAction) -> Result<(), TransportError> {
        self.script
            .lock()
            .unwrap()
            .stores
            .push((id.to_string(), action));
        self.gate().await
    }

    async fn expunge(&mut self) -> Result<bool, TransportError> {
        self.gate().await?;
        let mut s = self.script.lock().unwrap();
        s.expunges += 1;
        Ok(s.expunge_reply)
    }

    async fn logout(&mut self) -> Result<(), TransportError> {
        self.script.lock().unwrap().logouts += 1;
        self.gate().await
    }
}
