use snafu::{OptionExt, ensure};

use crate::error::{InvalidTransitionSnafu, MessageNotFoundSnafu, SessionResult};
use crate::ids::MessageId;
use crate::message::{Message, MessageStatus, Role};

/// Append-only, ordered transcript of one chat.
///
/// Vector order is display order. Entries are never reordered or deduplicated;
/// the only mutation allowed on an existing entry is settling a pending one.
#[derive(Debug, Clone)]
pub struct MessageLog {
    greeting: String,
    entries: Vec<Message>,
    next_id: MessageId,
}

impl MessageLog {
    /// Creates a transcript seeded with a committed assistant greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        let mut log = Self {
            greeting: greeting.into(),
            entries: Vec::new(),
            next_id: MessageId::new(1),
        };
        log.seed_greeting();
        log
    }

    pub fn append(
        &mut self,
        role: Role,
        text: impl Into<String>,
        status: MessageStatus,
    ) -> MessageId {
        let id = self.alloc_id();
        self.entries.push(Message::new(id, role, text, status));
        id
    }

    pub fn update_status(
        &mut self,
        id: MessageId,
        status: MessageStatus,
    ) -> SessionResult<&Message> {
        let message = self.settle(id, status, "update-message-status")?;
        Ok(&*message)
    }

    /// Settles a pending message and swaps in its final text.
    pub fn replace(
        &mut self,
        id: MessageId,
        text: impl Into<String>,
        status: MessageStatus,
    ) -> SessionResult<&Message> {
        let message = self.settle(id, status, "replace-message")?;
        message.text = text.into();
        Ok(&*message)
    }

    /// Drops every entry and re-seeds the greeting.
    ///
    /// The id counter keeps running, so a late resolution for a discarded
    /// message can never land on a new entry.
    pub fn reset(&mut self) -> &Message {
        self.entries.clear();
        self.seed_greeting()
    }

    pub fn entries(&self) -> Vec<Message> {
        self.entries.clone()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.entries.iter().find(|message| message.id == id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.get(id).is_some()
    }

    pub fn pending(&self) -> Option<&Message> {
        self.entries.iter().rev().find(|message| message.is_pending())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    fn settle(
        &mut self,
        id: MessageId,
        status: MessageStatus,
        stage: &'static str,
    ) -> SessionResult<&mut Message> {
        let message = self
            .entries
            .iter_mut()
            .find(|message| message.id == id)
            .context(MessageNotFoundSnafu { stage, id })?;

        ensure!(
            message.status.can_transition_to(status),
            InvalidTransitionSnafu {
                stage,
                id,
                from: message.status,
                to: status,
            }
        );

        message.status = status;
        Ok(message)
    }

    fn seed_greeting(&mut self) -> &Message {
        let id = self.alloc_id();
        self.entries.push(Message::assistant(id, self.greeting.clone()));
        &self.entries[self.entries.len() - 1]
    }

    fn alloc_id(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id = self.next_id.next();
        id
    }
}
