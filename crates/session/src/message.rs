use crate::ids::MessageId;

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status for one message.
///
/// `Pending` is only ever held by the user message of the turn in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    Committed,
    Pending,
    Failed,
}

impl MessageStatus {
    /// Returns true when `next` is a legal successor of this status.
    ///
    /// Only a pending message may move, and only to a terminal status.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Committed) | (Self::Pending, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
}

impl Message {
    pub fn new(id: MessageId, role: Role, text: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            status,
        }
    }

    /// Creates the optimistic echo of a user submission.
    pub fn user_pending(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, text, MessageStatus::Pending)
    }

    /// Creates a settled assistant entry (reply, greeting, or notice).
    pub fn assistant(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, text, MessageStatus::Committed)
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_messages_settle() {
        use MessageStatus::*;

        assert!(Pending.can_transition_to(Committed));
        assert!(Pending.can_transition_to(Failed));

        for from in [Committed, Failed] {
            for to in [Committed, Pending, Failed] {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
        assert!(!Pending.can_transition_to(Pending));
    }
}
