//! Message fetch and assembly.
//!
//! The engine hands back raw parts; [`assemble`] builds the public
//! [`Message`] from them in one place, including the permitted-action
//! set. Actions are derived here and nowhere else, so an engine cannot
//! disagree with the library about what a flag combination allows.

use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::{Connect, FetchedMessage};
use crate::types::{Action, Flags, Message, MessageId};

/// Fetches `id` from `folder` and assembles the full message.
///
/// Sequence numbers resolve against the folder's current numbering; UIDs
/// resolve independent of ordering. An identifier the engine cannot
/// resolve (for example one already expunged) maps to
/// [`Error::MessageNotFound`].
pub(crate) async fn load<C: Connect>(
    session: &mut Session<C>,
    folder: &str,
    id: MessageId,
) -> Result<Message> {
    session
        .fetch_message(folder, id)
        .await?
        .map(assemble)
        .ok_or(Error::MessageNotFound(id))
}

/// Builds a [`Message`] from fetched parts.
fn assemble(parts: FetchedMessage) -> Message {
    let actions = permitted_actions(&parts.flags);
    Message {
        seq: parts.seq,
        uid: parts.uid,
        flags: parts.flags,
        header: parts.header,
        body: parts.body,
        attachments: parts.attachments,
        actions,
    }
}

/// Derives what the caller may do with a message in this flag state:
/// deleting is permitted until `\Deleted` is set, and exactly one of
/// marking seen or unseen applies depending on `\Seen`.
fn permitted_actions(flags: &Flags) -> Vec<Action> {
    let mut actions = Vec::with_capacity(2);
    if !flags.is_deleted() {
        actions.push(Action::Delete);
    }
    if flags.is_seen() {
        actions.push(Action::MarkUnseen);
    } else {
        actions.push(Action::MarkSeen);
    }
    actions
}
