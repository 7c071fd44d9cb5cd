//! Message identifiers.
//!
//! Two addressing modes exist for a message: its position in the current
//! folder selection ([`SeqNum`]) and its stable unique identifier
//! ([`Uid`]). [`MessageId`] carries exactly one of the two.

use std::num::NonZeroU32;

/// Message sequence number.
///
/// Sequence numbers are assigned to messages in a folder starting from 1.
/// They are ephemeral: expunging any message renumbers everything behind
/// it, so a stored sequence number is only meaningful within the folder
/// selection it was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqNum(pub NonZeroU32);

impl SeqNum {
    /// Creates a new sequence number.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for SeqNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message.
///
/// UIDs are stable for the lifetime of a session: they survive expunges
/// and do not shift when other messages are removed. Search results are
/// always expressed in UIDs for exactly this reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub NonZeroU32);

impl Uid {
    /// Creates a new UID.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message address: either a sequence number or a UID.
///
/// Callers pick exactly one addressing mode by construction; supplying
/// neither or both is unrepresentable. `From` impls let any API taking
/// `impl Into<MessageId>` accept a bare [`SeqNum`] or [`Uid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Position in the current folder selection. Unreliable across an
    /// expunge.
    Seq(SeqNum),
    /// Stable identifier, resolved by the server independent of ordering.
    Uid(Uid),
}

impl From<SeqNum> for MessageId {
    fn from(seq: SeqNum) -> Self {
        Self::Seq(seq)
    }
}

impl From<Uid> for MessageId {
    fn from(uid: Uid) -> Self {
        Self::Uid(uid)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seq(seq) => write!(f, "sequence {seq}"),
            Self::Uid(uid) => write!(f, "uid {uid}"),
        }
    }
}
