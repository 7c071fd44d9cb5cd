//! Core value types.
//!
//! Identifiers, flags and the assembled message snapshot shared by the
//! session, loader and façade layers.

#![allow(clippy::missing_const_for_fn)]

mod identifiers;
mod message;

pub use identifiers::{MessageId, SeqNum, Uid};
pub use message::{Action, Attachment, Body, Flag, Flags, Header, Message};
