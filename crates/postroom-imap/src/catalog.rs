//! Folder catalog.
//!
//! One listing round trip per mailbox lifetime: the first [`list`]
//! populates the cache, every later call reuses it. Folder names go
//! over the wire with the `{host:port}` account reference attached and
//! are cached with it stripped, so lookups and the public listing both
//! speak plain folder names.
//!
//! [`list`]: FolderCatalog::list

use crate::error::Result;
use crate::session::Session;
use crate::transport::Connect;

/// Cached server folder hierarchy. `None` until first populated.
#[derive(Debug, Default)]
pub(crate) struct FolderCatalog {
    entries: Option<Vec<String>>,
}

impl FolderCatalog {
    pub(crate) const fn new() -> Self {
        Self { entries: None }
    }

    /// Returns the folder names, querying the server on first use.
    ///
    /// Population only needs the authenticated state, not a selected
    /// folder.
    pub(crate) async fn list<C: Connect>(
        &mut self,
        session: &mut Session<C>,
    ) -> Result<&[String]> {
        if self.entries.is_none() {
            let root = session.config().server_ref();
            let names: Vec<String> = session
                .list_folders()
                .await?
                .into_iter()
                .map(|name| match name.strip_prefix(&root) {
                    Some(stripped) => stripped.to_owned(),
                    None => name,
                })
                .collect();
            tracing::debug!(folders = names.len(), "Folder catalog populated");
            self.entries = Some(names);
        }
        Ok(self.entries.as_deref().unwrap_or_default())
    }

    /// Pure lookup against the cache. Always false before population.
    pub(crate) fn contains(&self, folder: &str) -> bool {
        self.entries
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|name| name == folder)
    }

    /// Clears the cache so the next [`list`](Self::list) re-queries the
    /// server.
    pub(crate) fn invalidate(&mut self) {
        self.entries = None;
    }
}
