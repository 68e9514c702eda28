#![deny(unsafe_code)]

//! Conversational session core of the Teacher Assistant client.
//!
//! Owns the ordered transcript, the uploaded-document registry and the
//! single-flight lifecycle of chat turns. Inference and document storage are
//! reached through the [`Assistant`] and [`DocumentStore`] capabilities.

pub mod capability;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod ids;
pub mod log;
pub mod message;
pub mod registry;
pub mod session;

pub use capability::{
    Assistant, AssistantReply, AssistantRequest, BoxFuture, DocumentStore, DocumentUpload,
};
pub use controller::SessionController;
pub use coordinator::{
    ActiveTurn, RequestCoordinator, TurnOutcome, TurnState, TurnTransition,
    TurnTransitionRejection, TurnTransitionResult, UploadOutcome,
};
pub use error::{SessionError, SessionResult, TransportFailure, TransportResult};
pub use events::SessionEvent;
pub use ids::{DocumentId, MessageId};
pub use log::MessageLog;
pub use message::{Message, MessageStatus, Role};
pub use registry::{DocumentRef, DocumentRegistry};
pub use session::{
    DEFAULT_FAILURE_NOTICE, DEFAULT_GREETING, DEFAULT_UPLOAD_ANNOUNCEMENT,
    DEFAULT_UPLOAD_FAILURE_NOTICE, Session, SessionContext,
};
