//! Integration tests for the mailbox façade.
//!
//! These tests drive the public API against an in-memory engine that
//! behaves like a small server: per-connection folder selection, UID
//! assignment, flag storage and expunge renumbering. No real server
//! connection is involved.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use postroom_imap::{
    Body, Connect, Error, FetchedMessage, Flag, Flags, Header, Mailbox, MessageId, SearchQuery,
    SeqNum, Session, SessionConfig, SortOrder, StoreAction, Transport, TransportError, Uid,
};

/// One stored message. Sequence numbers are implicit: a message's
/// position in the folder vector, 1-based, renumbered by expunge.
struct StoredMessage {
    uid: u32,
    subject: String,
    seen: bool,
    deleted: bool,
}

struct StoredFolder {
    name: String,
    messages: Vec<StoredMessage>,
    next_uid: u32,
}

struct ServerState {
    folders: Vec<StoredFolder>,
    /// Bumped by `sever`; transports from older generations fail their
    /// next exchange as the server having dropped them.
    generation: usize,
    connects: usize,
}

impl ServerState {
    fn folder_mut(&mut self, name: &str) -> Option<&mut StoredFolder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }
}

/// In-memory engine shared by every connection made from it.
#[derive(Clone)]
struct MemoryEngine {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryEngine {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                folders: Vec::new(),
                generation: 0,
                connects: 0,
            })),
        }
    }

    fn add_folder(&self, name: &str) {
        self.state.lock().unwrap().folders.push(StoredFolder {
            name: name.to_owned(),
            messages: Vec::new(),
            next_uid: 1,
        });
    }

    fn deliver(&self, folder: &str, subject: &str) -> u32 {
        let mut state = self.state.lock().unwrap();
        let folder = state.folder_mut(folder).expect("folder exists");
        let uid = folder.next_uid;
        folder.next_uid += 1;
        folder.messages.push(StoredMessage {
            uid,
            subject: subject.to_owned(),
            seen: false,
            deleted: false,
        });
        uid
    }

    /// Drops every live connection, as a server restart would.
    fn sever(&self) {
        self.state.lock().unwrap().generation += 1;
    }

    fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }
}

impl Connect for MemoryEngine {
    type Transport = MemoryTransport;

    async fn connect(&self, _config: &SessionConfig) -> Result<MemoryTransport, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        Ok(MemoryTransport {
            state: Arc::clone(&self.state),
            generation: state.generation,
            selected: None,
        })
    }
}

struct MemoryTransport {
    state: Arc<Mutex<ServerState>>,
    generation: usize,
    selected: Option<String>,
}

impl MemoryTransport {
    fn selected(&self) -> Result<String, TransportError> {
        self.selected
            .clone()
            .ok_or_else(|| TransportError::Bad("no folder selected".into()))
    }

    fn check_alive(&self, state: &ServerState) -> Result<(), TransportError> {
        if self.generation == state.generation {
            Ok(())
        } else {
            Err(TransportError::ConnectionLost("connection severed".into()))
        }
    }
}

fn matches_query(query: &str, message: &StoredMessage) -> Result<bool, TransportError> {
    match query {
        "ALL" => Ok(true),
        "SEEN" => Ok(message.seen),
        "UNSEEN" => Ok(!message.seen),
        "DELETED" => Ok(message.deleted),
        "UNDELETED" => Ok(!message.deleted),
        _ => {
            if let Some(rest) = query.strip_prefix("SUBJECT ") {
                Ok(message.subject.contains(rest.trim_matches('"')))
            } else {
                Err(TransportError::Bad(format!("unsupported query: {query}")))
            }
        }
    }
}

impl Transport for MemoryTransport {
    async fn select(&mut self, folder: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        if state.folder_mut(folder).is_none() {
            return Err(TransportError::No(format!("no such folder: {folder}")));
        }
        self.selected = Some(folder.to_owned());
        Ok(())
    }

    async fn list_folders(&mut self, root: &str) -> Result<Vec<String>, TransportError> {
        let state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        Ok(state
            .folders
            .iter()
            .map(|f| format!("{root}{}", f.name))
            .collect())
    }

    async fn uid_search(&mut self, query: &str) -> Result<Option<Vec<Uid>>, TransportError> {
        let selected = self.selected()?;
        let mut state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        let folder = state
            .folder_mut(&selected)
            .ok_or_else(|| TransportError::Bad("selected folder vanished".into()))?;

        let mut hits = Vec::new();
        for message in &folder.messages {
            if matches_query(query, message)? {
                hits.push(Uid(NonZeroU32::new(message.uid).unwrap()));
            }
        }
        // An empty result goes back as the explicit no-results signal
        Ok(if hits.is_empty() { None } else { Some(hits) })
    }

    async fn fetch_message(
        &mut self,
        id: MessageId,
    ) -> Result<Option<FetchedMessage>, TransportError> {
        let selected = self.selected()?;
        let mut state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        let folder = state
            .folder_mut(&selected)
            .ok_or_else(|| TransportError::Bad("selected folder vanished".into()))?;

        let index = match id {
            MessageId::Seq(seq) => {
                let position = usize::try_from(seq.get()).unwrap() - 1;
                if position >= folder.messages.len() {
                    return Ok(None);
                }
                position
            }
            MessageId::Uid(uid) => {
                match folder.messages.iter().position(|m| m.uid == uid.get()) {
                    Some(position) => position,
                    None => return Ok(None),
                }
            }
        };

        let message = &folder.messages[index];
        let mut flags = Flags::new();
        if message.seen {
            flags.insert(Flag::Seen);
        }
        if message.deleted {
            flags.insert(Flag::Deleted);
        }
        Ok(Some(FetchedMessage {
            seq: SeqNum(NonZeroU32::new(u32::try_from(index).unwrap() + 1).unwrap()),
            uid: Uid(NonZeroU32::new(message.uid).unwrap()),
            flags,
            header: Header {
                subject: Some(message.subject.clone()),
                from: Some("sender@example.com".into()),
                ..Header::default()
            },
            body: Body {
                text: Some(format!("Body of {}", message.subject)),
                html: None,
            },
            attachments: Vec::new(),
        }))
    }

    async fn count_messages(&mut self) -> Result<u32, TransportError> {
        let selected = self.selected()?;
        let mut state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        let folder = state
            .folder_mut(&selected)
            .ok_or_else(|| TransportError::Bad("selected folder vanished".into()))?;
        Ok(u32::try_from(folder.messages.len()).unwrap())
    }

    async fn store(&mut self, id: MessageId, action: StoreAction) -> Result<(), TransportError> {
        let selected = self.selected()?;
        let mut state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        let folder = state
            .folder_mut(&selected)
            .ok_or_else(|| TransportError::Bad("selected folder vanished".into()))?;

        let message = match id {
            MessageId::Seq(seq) => folder
                .messages
                .get_mut(usize::try_from(seq.get()).unwrap() - 1),
            MessageId::Uid(uid) => folder.messages.iter_mut().find(|m| m.uid == uid.get()),
        };
        let Some(message) = message else {
            return Err(TransportError::No("no such message".into()));
        };
        match action {
            StoreAction::Add(Flag::Seen) => message.seen = true,
            StoreAction::Remove(Flag::Seen) => message.seen = false,
            StoreAction::Add(Flag::Deleted) => message.deleted = true,
            StoreAction::Remove(Flag::Deleted) => message.deleted = false,
            other => return Err(TransportError::Bad(format!("unsupported store: {other:?}"))),
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<bool, TransportError> {
        let selected = self.selected()?;
        let mut state = self.state.lock().unwrap();
        self.check_alive(&state)?;
        let folder = state
            .folder_mut(&selected)
            .ok_or_else(|| TransportError::Bad("selected folder vanished".into()))?;
        folder.messages.retain(|m| !m.deleted);
        Ok(true)
    }

    async fn logout(&mut self) -> Result<(), TransportError> {
        let state = self.state.lock().unwrap();
        self.check_alive(&state)
    }
}

fn config() -> SessionConfig {
    SessionConfig::builder("imap.example.com")
        .credentials("user@example.com", "s3cret")
        .build()
}

/// INBOX with three messages (uids 1..=3, oldest first) plus an empty
/// Archive folder.
fn seeded() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.add_folder("INBOX");
    engine.add_folder("Archive");
    engine.deliver("INBOX", "Welcome");
    engine.deliver("INBOX", "Weekly report");
    engine.deliver("INBOX", "Lunch?");
    engine
}

fn uid(n: u32) -> Uid {
    Uid(NonZeroU32::new(n).unwrap())
}

#[tokio::test]
async fn test_walkthrough() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine.clone()));

    // Folder discovery, with the account reference already stripped
    let folders = mailbox.folders().await.unwrap().to_vec();
    assert_eq!(folders, ["INBOX", "Archive"]);

    mailbox.select_folder("INBOX").await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 3);

    // Most recently arrived first
    let cursor = mailbox.messages().await.unwrap();
    assert_eq!(cursor.uids(), [uid(3), uid(2), uid(1)]);

    // Fetch and flag the newest
    let message = mailbox.message(uid(3)).await.unwrap();
    assert_eq!(message.header.subject.as_deref(), Some("Lunch?"));
    assert!(!message.flags.is_seen());
    mailbox.mark_seen(uid(3)).await.unwrap();

    let unseen = mailbox
        .search(&SearchQuery::Unseen, SortOrder::NewestFirst)
        .await
        .unwrap();
    assert_eq!(unseen.uids(), [uid(2), uid(1)]);

    // Two-phase removal
    mailbox.delete(uid(1)).await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 3);
    assert!(mailbox.expunge().await.unwrap());
    assert_eq!(mailbox.count().await.unwrap(), 2);

    mailbox.disconnect().await;
    // One connection carried the whole walkthrough
    assert_eq!(engine.connects(), 1);
}

#[tokio::test]
async fn test_unknown_folder_is_rejected_without_wire_select() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine));

    let err = mailbox.select_folder("Spam").await.unwrap_err();
    assert!(matches!(err, Error::FolderNotFound(ref name) if name == "Spam"));
    assert_eq!(mailbox.folder(), None);
}

#[tokio::test]
async fn test_folder_switching() {
    let engine = seeded();
    engine.deliver("Archive", "Old news");
    let mut mailbox = Mailbox::new(Session::new(config(), engine));

    mailbox.select_folder("INBOX").await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 3);

    mailbox.select_folder("Archive").await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 1);

    mailbox.select_folder("INBOX").await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_reconnects_transparently_after_server_restart() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine.clone()));

    mailbox.select_folder("INBOX").await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 3);

    engine.sever();

    // The dropped connection costs a retry, not an error
    assert_eq!(mailbox.count().await.unwrap(), 3);
    assert_eq!(engine.connects(), 2);
}

#[tokio::test]
async fn test_search_cursor_survives_expunge() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine));
    mailbox.select_folder("INBOX").await.unwrap();

    let cursor = mailbox.messages().await.unwrap();
    assert_eq!(cursor.uids(), [uid(3), uid(2), uid(1)]);

    mailbox.delete(uid(2)).await.unwrap();
    mailbox.expunge().await.unwrap();

    // The captured identifiers are unchanged; the expunged one simply
    // no longer resolves, while the others still do
    assert_eq!(cursor.uids(), [uid(3), uid(2), uid(1)]);
    let err = mailbox.message(uid(2)).await.unwrap_err();
    assert!(matches!(err, Error::MessageNotFound(MessageId::Uid(u)) if u == uid(2)));
    let message = mailbox.message(uid(3)).await.unwrap();
    assert_eq!(message.header.subject.as_deref(), Some("Lunch?"));
}

#[tokio::test]
async fn test_sequence_numbers_shift_after_expunge() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine));
    mailbox.select_folder("INBOX").await.unwrap();

    let first = mailbox.message(SeqNum::new(1).unwrap()).await.unwrap();
    assert_eq!(first.uid, uid(1));

    mailbox.delete(uid(1)).await.unwrap();
    mailbox.expunge().await.unwrap();

    // Sequence 1 now addresses a different message; this is why search
    // cursors capture UIDs
    let shifted = mailbox.message(SeqNum::new(1).unwrap()).await.unwrap();
    assert_eq!(shifted.uid, uid(2));
}

#[tokio::test]
async fn test_no_matches_yields_empty_cursor() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine));
    mailbox.select_folder("INBOX").await.unwrap();

    for n in 1..=3 {
        mailbox.mark_seen(uid(n)).await.unwrap();
    }

    // The engine reports "no results" explicitly; the cursor is empty,
    // not an error
    let unseen = mailbox
        .search(&SearchQuery::Unseen, SortOrder::NewestFirst)
        .await
        .unwrap();
    assert!(unseen.is_empty());
    assert_eq!(unseen.iter().count(), 0);
}

#[tokio::test]
async fn test_typed_subject_query_round_trip() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine));
    mailbox.select_folder("INBOX").await.unwrap();

    let cursor = mailbox
        .search(
            &SearchQuery::Subject("Weekly report".into()),
            SortOrder::OldestFirst,
        )
        .await
        .unwrap();
    assert_eq!(cursor.uids(), [uid(2)]);
}

#[tokio::test]
async fn test_mark_unseen_round_trip() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine));
    mailbox.select_folder("INBOX").await.unwrap();

    mailbox.mark_seen(uid(1)).await.unwrap();
    assert!(mailbox.message(uid(1)).await.unwrap().flags.is_seen());

    mailbox.mark_unseen(uid(1)).await.unwrap();
    assert!(!mailbox.message(uid(1)).await.unwrap().flags.is_seen());
}

#[tokio::test]
async fn test_two_mailboxes_run_independent_sessions() {
    let engine = seeded();
    let mut inbox = Mailbox::new(Session::new(config(), engine.clone()));
    let mut archive = Mailbox::new(Session::new(config(), engine.clone()));
    engine.deliver("Archive", "Old news");

    inbox.select_folder("INBOX").await.unwrap();
    archive.select_folder("Archive").await.unwrap();

    // Interleaved use: each mailbox keeps its own selection
    assert_eq!(inbox.count().await.unwrap(), 3);
    assert_eq!(archive.count().await.unwrap(), 1);
    assert_eq!(inbox.count().await.unwrap(), 3);

    assert_eq!(engine.connects(), 2);
}

#[tokio::test]
async fn test_disconnected_mailbox_reconnects_on_next_use() {
    let engine = seeded();
    let mut mailbox = Mailbox::new(Session::new(config(), engine.clone()));

    mailbox.select_folder("INBOX").await.unwrap();
    assert_eq!(mailbox.count().await.unwrap(), 3);

    mailbox.disconnect().await;
    mailbox.disconnect().await; // idempotent

    assert_eq!(mailbox.count().await.unwrap(), 3);
    assert_eq!(engine.connects(), 2);
}
