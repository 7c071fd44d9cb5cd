//! Message values: flags, header fields, body content, attachments and
//! the assembled [`Message`] snapshot.

use bytes::Bytes;

use super::identifiers::{SeqNum, Uid};

/// Message flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent (first session to see it).
    Recent,
    /// Custom keyword flag.
    Keyword(String),
}

impl Flag {
    /// Parses a flag string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the flag as an IMAP string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(s) => s,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collection of message flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty flags collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates flags from a vector.
    #[must_use]
    pub fn from_vec(flags: Vec<Flag>) -> Self {
        Self { flags }
    }

    /// Adds a flag.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.flags.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true if the message has been seen.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Returns true if the message is marked for deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Iterates over the flags.
    pub fn iter(&self) -> std::slice::Iter<'_, Flag> {
        self.flags.iter()
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` if no flags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl<'a> IntoIterator for &'a Flags {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Header fields of a fetched message.
///
/// All fields are optional: servers omit what a message never carried.
/// Dates are kept in the server's textual form; interpreting them is the
/// caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Subject line.
    pub subject: Option<String>,
    /// Sender address.
    pub from: Option<String>,
    /// Primary recipient address.
    pub to: Option<String>,
    /// Date header as reported by the server.
    pub date: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Body content of a fetched message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    /// Plain-text part, if present.
    pub text: Option<String>,
    /// HTML part, if present.
    pub html: Option<String>,
}

/// An attachment of a fetched message.
///
/// The payload is an opaque byte sequence; decoding and MIME
/// interpretation are out of scope here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name as declared by the message.
    pub filename: String,
    /// Declared content type (e.g. `application/pdf`).
    pub content_type: String,
    /// Raw payload bytes.
    pub payload: Bytes,
}

/// An operation the caller is permitted to perform on a message, derived
/// from its flags at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Mark the message for deletion (`\Deleted`). Permanent removal
    /// still requires an expunge.
    Delete,
    /// Set the `\Seen` flag.
    MarkSeen,
    /// Clear the `\Seen` flag.
    MarkUnseen,
}

/// A fully assembled message.
///
/// An immutable snapshot of server state at fetch time. Mutating flags
/// on the server does not write back into this value, and clearing a
/// flag here would not reach the server. Owned by the caller once
/// returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sequence number within the folder selection the fetch ran against.
    pub seq: SeqNum,
    /// Stable unique identifier.
    pub uid: Uid,
    /// Flags at fetch time.
    pub flags: Flags,
    /// Header fields.
    pub header: Header,
    /// Body content.
    pub body: Body,
    /// Attachments.
    pub attachments: Vec<Attachment>,
    /// Actions permitted given the flags at fetch time.
    pub actions: Vec<Action>,
}

impl Message {
    /// Returns true if the given action is permitted on this snapshot.
    #[must_use]
    pub fn permits(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}
