use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::capability::{Assistant, DocumentStore, DocumentUpload};
use crate::coordinator::{RequestCoordinator, TurnOutcome, UploadOutcome};
use crate::error::SessionResult;
use crate::events::SessionEvent;
use crate::ids::DocumentId;
use crate::message::Message;
use crate::registry::DocumentRef;
use crate::session::{Session, SessionContext};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Entry point for front ends and test harnesses.
///
/// Owns the session exclusively. Every method takes `&self`, so a chat turn
/// and uploads can be driven concurrently from one controller.
pub struct SessionController {
    session: Mutex<Session>,
    coordinator: RequestCoordinator,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        context: SessionContext,
        assistant: Arc<dyn Assistant>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session = Session::new(&context);
        let coordinator = RequestCoordinator::new(assistant, documents, context, events.clone());

        Self {
            session: Mutex::new(session),
            coordinator,
            events,
        }
    }

    /// Sends one chat message.
    ///
    /// Blank input is ignored and yields `Ok(None)`. The selected document is
    /// used for grounding only while the registry holds at least one document.
    pub async fn send_message(&self, text: &str) -> SessionResult<Option<TurnOutcome>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let grounding = {
            let session = self.session.lock();
            if session.registry.has_any() {
                session.registry.selected().cloned()
            } else {
                None
            }
        };

        self.coordinator
            .submit(&self.session, text, grounding)
            .await
            .map(Some)
    }

    pub async fn upload_document(&self, upload: DocumentUpload) -> SessionResult<UploadOutcome> {
        self.coordinator.upload(&self.session, upload).await
    }

    pub fn select_document(&self, id: DocumentId) -> SessionResult<DocumentRef> {
        let mut session = self.session.lock();
        let selected = session.registry.select(id)?.clone();
        tracing::debug!(document_id = %id, "grounding document selected");
        self.emit(SessionEvent::DocumentsChanged);
        Ok(selected)
    }

    pub fn deselect_document(&self) {
        let mut session = self.session.lock();
        session.registry.deselect();
        tracing::debug!("grounding document cleared");
        self.emit(SessionEvent::DocumentsChanged);
    }

    /// Deletes a document; unknown ids are a no-op and return `None`.
    pub fn delete_document(&self, id: DocumentId) -> Option<DocumentRef> {
        let mut session = self.session.lock();
        let removed = session.registry.remove(id);
        if removed.is_some() {
            tracing::info!(document_id = %id, "document removed");
            self.emit(SessionEvent::DocumentsChanged);
        }
        removed
    }

    /// Clears the transcript back to the greeting. Documents are kept.
    ///
    /// Events are sent before the session lock is released, so the feed sees
    /// mutations in the same order as the transcript.
    pub fn start_new_chat(&self) -> Message {
        let mut session = self.session.lock();
        let greeting = session.messages.reset().clone();
        tracing::debug!(greeting_id = %greeting.id, "transcript reset");
        self.emit(SessionEvent::TranscriptReset(greeting.clone()));
        greeting
    }

    pub fn entries(&self) -> Vec<Message> {
        self.session.lock().messages.entries()
    }

    pub fn documents(&self) -> Vec<DocumentRef> {
        self.session.lock().registry.documents().to_vec()
    }

    pub fn selected_document(&self) -> Option<DocumentRef> {
        self.session.lock().registry.selected().cloned()
    }

    pub fn has_documents(&self) -> bool {
        self.session.lock().registry.has_any()
    }

    pub fn is_sending(&self) -> bool {
        self.coordinator.is_sending()
    }

    pub fn context(&self) -> &SessionContext {
        self.coordinator.context()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
