use snafu::Snafu;

use crate::ids::{DocumentId, MessageId};
use crate::message::MessageStatus;

/// Model-invariant violations raised by the session core.
///
/// None of these are expected at runtime; a front end that disables input
/// while a turn is in flight and only offers ids it was handed will never see
/// them.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("a chat turn is already in flight for message {pending}"))]
    Busy {
        stage: &'static str,
        pending: MessageId,
    },
    #[snafu(display("message {id} was not found in the transcript"))]
    MessageNotFound { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} cannot move from {from:?} to {to:?}"))]
    InvalidTransition {
        stage: &'static str,
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
    },
    #[snafu(display("document {id} is already registered"))]
    DuplicateDocument { stage: &'static str, id: DocumentId },
    #[snafu(display("document {id} is not registered"))]
    DocumentNotFound { stage: &'static str, id: DocumentId },
    #[snafu(display("document id '{raw}' is not a valid uuid"))]
    InvalidDocumentId {
        stage: &'static str,
        raw: String,
        source: uuid::Error,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by an external capability (network error, non-success
/// response, timeout).
///
/// Never escapes the request coordinator; it is turned into a visible notice.
#[derive(Debug, Snafu)]
#[snafu(display("{capability} capability failed: {source}"))]
pub struct TransportFailure {
    capability: &'static str,
    source: BoxError,
}

impl TransportFailure {
    pub fn new(capability: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            capability,
            source: source.into(),
        }
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }
}

pub type TransportResult<T> = Result<T, TransportFailure>;
