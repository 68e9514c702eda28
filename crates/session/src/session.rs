use crate::log::MessageLog;
use crate::registry::DocumentRegistry;

pub const DEFAULT_GREETING: &str = "Hello! I'm your Teacher Assistant. Upload documents to get started, or ask me anything about teaching, curriculum, classroom management, assessment, or differentiation strategies.";
pub const DEFAULT_FAILURE_NOTICE: &str = "Sorry, I encountered an error. Please try again.";
pub const DEFAULT_UPLOAD_ANNOUNCEMENT: &str = "✓ Document \"{name}\" uploaded successfully! Now you can ask me questions about this document.";
pub const DEFAULT_UPLOAD_FAILURE_NOTICE: &str = "Failed to upload document. Please try again.";

/// Construction-time context for one session.
///
/// Holds every user-visible text the core emits on its own, so hosts can
/// localise them without touching global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub greeting: String,
    pub failure_notice: String,
    /// Announcement template; `{name}` is replaced by the document name.
    pub upload_announcement: String,
    pub upload_failure_notice: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
            upload_announcement: DEFAULT_UPLOAD_ANNOUNCEMENT.to_string(),
            upload_failure_notice: DEFAULT_UPLOAD_FAILURE_NOTICE.to_string(),
        }
    }
}

impl SessionContext {
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    pub fn announce_upload(&self, display_name: &str) -> String {
        self.upload_announcement.replace("{name}", display_name)
    }
}

/// Transcript plus workspace documents.
///
/// The two halves never reference each other; the controller mediates.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) messages: MessageLog,
    pub(crate) registry: DocumentRegistry,
}

impl Session {
    pub fn new(context: &SessionContext) -> Self {
        Self {
            messages: MessageLog::new(context.greeting.clone()),
            registry: DocumentRegistry::new(),
        }
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }
}
