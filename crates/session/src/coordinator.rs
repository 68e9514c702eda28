use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::capability::{
    Assistant, AssistantReply, AssistantRequest, DocumentStore, DocumentUpload,
};
use crate::error::{BusySnafu, SessionResult, TransportResult};
use crate::events::SessionEvent;
use crate::ids::MessageId;
use crate::message::{Message, MessageStatus, Role};
use crate::registry::DocumentRef;
use crate::session::{Session, SessionContext};

/// The chat turn currently awaiting the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTurn {
    pub user_message: MessageId,
    /// Grounding captured at submit time; later registry edits do not touch it.
    pub grounding: Option<DocumentRef>,
}

/// Single-flight lifecycle of chat turns.
///
/// `Succeeded` and `Failed` are not resting states: resolving a turn returns
/// straight to `Idle` and the outcome is reported as a [`TurnOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Sending(ActiveTurn),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransition {
    Start(ActiveTurn),
    Succeed(MessageId),
    Fail(MessageId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransitionRejection {
    AlreadySending {
        active: MessageId,
        attempted: MessageId,
    },
    NoActiveTurn,
    TurnMismatch {
        active: MessageId,
        attempted: MessageId,
    },
}

pub type TurnTransitionResult = Result<TurnState, TurnTransitionRejection>;

impl TurnState {
    pub fn active(&self) -> Option<&ActiveTurn> {
        match self {
            Self::Sending(active) => Some(active),
            Self::Idle => None,
        }
    }

    pub fn is_sending(&self) -> bool {
        matches!(self, Self::Sending(_))
    }

    /// Applies one transition; resolutions must name the active turn.
    pub fn apply(&self, transition: TurnTransition) -> TurnTransitionResult {
        match (self, transition) {
            (Self::Idle, TurnTransition::Start(turn)) => Ok(Self::Sending(turn)),
            (Self::Sending(active), TurnTransition::Start(turn)) => {
                Err(TurnTransitionRejection::AlreadySending {
                    active: active.user_message,
                    attempted: turn.user_message,
                })
            }
            (Self::Sending(active), TurnTransition::Succeed(id) | TurnTransition::Fail(id)) => {
                if active.user_message == id {
                    Ok(Self::Idle)
                } else {
                    Err(TurnTransitionRejection::TurnMismatch {
                        active: active.user_message,
                        attempted: id,
                    })
                }
            }
            (Self::Idle, TurnTransition::Succeed(_) | TurnTransition::Fail(_)) => {
                Err(TurnTransitionRejection::NoActiveTurn)
            }
        }
    }
}

/// How one chat turn resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The user message is committed and `reply` was appended after it.
    Succeeded { user: Message, reply: Message },
    /// The user message is marked failed and `notice` was appended after it.
    Failed { user: Message, notice: Message },
    /// The transcript was reset while the turn was in flight; nothing was written.
    Discarded,
}

/// How one upload resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded {
        document: DocumentRef,
        announcement: Message,
    },
    Failed {
        notice: Message,
    },
}

/// Serializes chat turns and reconciles capability results into the session.
///
/// Lock order is always `turn` then `session`; neither lock is held across an
/// await point.
pub struct RequestCoordinator {
    assistant: Arc<dyn Assistant>,
    documents: Arc<dyn DocumentStore>,
    context: SessionContext,
    turn: Mutex<TurnState>,
    events: broadcast::Sender<SessionEvent>,
}

impl RequestCoordinator {
    pub fn new(
        assistant: Arc<dyn Assistant>,
        documents: Arc<dyn DocumentStore>,
        context: SessionContext,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            assistant,
            documents,
            context,
            turn: Mutex::new(TurnState::Idle),
            events,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn.lock().clone()
    }

    pub fn is_sending(&self) -> bool {
        self.turn.lock().is_sending()
    }

    /// Runs one chat turn end to end.
    ///
    /// The optimistic user echo is appended before the first await, so its id
    /// is fixed by call order no matter when the reply arrives.
    pub async fn submit(
        &self,
        session: &Mutex<Session>,
        text: impl Into<String>,
        grounding: Option<DocumentRef>,
    ) -> SessionResult<TurnOutcome> {
        let text = text.into();
        let (user_message, request) = {
            let mut turn = self.turn.lock();
            if let TurnState::Sending(active) = &*turn {
                tracing::warn!(
                    pending_message_id = %active.user_message,
                    "rejected chat submission while another turn is in flight"
                );
                return BusySnafu {
                    stage: "submit-turn",
                    pending: active.user_message,
                }
                .fail();
            }

            let mut session = session.lock();
            let user_message = session
                .messages
                .append(Role::User, text.clone(), MessageStatus::Pending);
            let active = ActiveTurn {
                user_message,
                grounding: grounding.clone(),
            };
            match turn.apply(TurnTransition::Start(active)) {
                Ok(next) => *turn = next,
                Err(rejection) => {
                    tracing::error!(?rejection, "idle turn state refused to start");
                }
            }

            if let Some(echo) = session.messages.get(user_message) {
                self.emit(SessionEvent::MessageAppended(echo.clone()));
            }
            (user_message, AssistantRequest::new(text, grounding))
        };

        tracing::debug!(
            message_id = %user_message,
            use_grounding = request.use_grounding,
            document_id = ?request.grounding.as_ref().map(|document| document.id),
            "chat turn sent"
        );

        let result = self.assistant.respond(request).await;
        self.finish_turn(session, user_message, result)
    }

    fn finish_turn(
        &self,
        session: &Mutex<Session>,
        user_message: MessageId,
        result: TransportResult<AssistantReply>,
    ) -> SessionResult<TurnOutcome> {
        let mut turn = self.turn.lock();
        let transition = match &result {
            Ok(_) => TurnTransition::Succeed(user_message),
            Err(_) => TurnTransition::Fail(user_message),
        };
        match turn.apply(transition) {
            Ok(next) => *turn = next,
            Err(rejection) => {
                tracing::error!(
                    message_id = %user_message,
                    ?rejection,
                    "turn resolution does not match the active turn"
                );
                return Ok(TurnOutcome::Discarded);
            }
        }

        let mut session = session.lock();
        if !session.messages.contains(user_message) {
            tracing::warn!(
                message_id = %user_message,
                succeeded = result.is_ok(),
                "transcript was reset while the turn was in flight; dropping resolution"
            );
            return Ok(TurnOutcome::Discarded);
        }

        match result {
            Ok(reply) => {
                let user = session
                    .messages
                    .update_status(user_message, MessageStatus::Committed)?
                    .clone();
                let reply = self.append_assistant(&mut session, reply.text);
                self.emit(SessionEvent::MessageUpdated(user.clone()));
                self.emit(SessionEvent::MessageAppended(reply.clone()));

                tracing::debug!(
                    message_id = %user.id,
                    reply_id = %reply.id,
                    "chat turn succeeded"
                );
                Ok(TurnOutcome::Succeeded { user, reply })
            }
            Err(error) => {
                tracing::warn!(
                    message_id = %user_message,
                    capability = error.capability(),
                    error = %error,
                    "chat turn failed"
                );

                let user = session
                    .messages
                    .update_status(user_message, MessageStatus::Failed)?
                    .clone();
                let notice =
                    self.append_assistant(&mut session, self.context.failure_notice.clone());
                self.emit(SessionEvent::MessageUpdated(user.clone()));
                self.emit(SessionEvent::MessageAppended(notice.clone()));
                Ok(TurnOutcome::Failed { user, notice })
            }
        }
    }

    /// Uploads one file. Not guarded by the chat lock; uploads may overlap
    /// each other and a chat turn.
    pub async fn upload(
        &self,
        session: &Mutex<Session>,
        upload: DocumentUpload,
    ) -> SessionResult<UploadOutcome> {
        let file_name = upload.file_name.clone();
        let byte_count = upload.bytes.len();
        let result = self.documents.upload(upload).await;

        let mut session = session.lock();
        match result {
            Ok(document) => {
                session.registry.add(document.clone())?;
                let announcement = self.append_assistant(
                    &mut session,
                    self.context.announce_upload(&document.display_name),
                );
                self.emit(SessionEvent::DocumentsChanged);
                self.emit(SessionEvent::MessageAppended(announcement.clone()));

                tracing::info!(
                    document_id = %document.id,
                    display_name = %document.display_name,
                    byte_size = document.byte_size,
                    media_kind = %document.media_kind,
                    "document uploaded"
                );
                Ok(UploadOutcome::Uploaded {
                    document,
                    announcement,
                })
            }
            Err(error) => {
                tracing::warn!(
                    file_name = %file_name,
                    byte_count,
                    error = %error,
                    "document upload failed"
                );

                let notice = self
                    .append_assistant(&mut session, self.context.upload_failure_notice.clone());
                self.emit(SessionEvent::MessageAppended(notice.clone()));
                Ok(UploadOutcome::Failed { notice })
            }
        }
    }

    fn append_assistant(&self, session: &mut Session, text: String) -> Message {
        let id = session
            .messages
            .append(Role::Assistant, text.clone(), MessageStatus::Committed);
        Message::assistant(id, text)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; the log stays the source of truth.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(id: u64) -> ActiveTurn {
        ActiveTurn {
            user_message: MessageId::new(id),
            grounding: None,
        }
    }

    #[test]
    fn idle_starts_and_resolves_back_to_idle() {
        let sending = TurnState::Idle.apply(TurnTransition::Start(turn(2))).unwrap();
        assert!(sending.is_sending());

        let succeeded = sending
            .apply(TurnTransition::Succeed(MessageId::new(2)))
            .unwrap();
        assert_eq!(succeeded, TurnState::Idle);

        let failed = sending.apply(TurnTransition::Fail(MessageId::new(2))).unwrap();
        assert_eq!(failed, TurnState::Idle);
    }

    #[test]
    fn sending_rejects_a_second_start() {
        let sending = TurnState::Sending(turn(2));
        let rejection = sending.apply(TurnTransition::Start(turn(4))).unwrap_err();

        assert_eq!(
            rejection,
            TurnTransitionRejection::AlreadySending {
                active: MessageId::new(2),
                attempted: MessageId::new(4),
            }
        );
    }

    #[test]
    fn resolutions_must_match_the_active_turn() {
        let sending = TurnState::Sending(turn(2));
        assert!(matches!(
            sending.apply(TurnTransition::Succeed(MessageId::new(3))),
            Err(TurnTransitionRejection::TurnMismatch { .. })
        ));
        assert_eq!(
            TurnState::Idle.apply(TurnTransition::Fail(MessageId::new(2))),
            Err(TurnTransitionRejection::NoActiveTurn)
        );
    }
}
