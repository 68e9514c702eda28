use std::future::Future;
use std::pin::Pin;

use crate::error::TransportResult;
use crate::registry::DocumentRef;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything the assistant receives for one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    pub text: String,
    pub use_grounding: bool,
    pub grounding: Option<DocumentRef>,
}

impl AssistantRequest {
    /// Builds a request; grounding mode follows the presence of a document.
    pub fn new(text: impl Into<String>, grounding: Option<DocumentRef>) -> Self {
        Self {
            text: text.into(),
            use_grounding: grounding.is_some(),
            grounding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub text: String,
}

impl AssistantReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Raw file handed to the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Remote inference capability.
pub trait Assistant: Send + Sync {
    fn respond<'a>(
        &'a self,
        request: AssistantRequest,
    ) -> BoxFuture<'a, TransportResult<AssistantReply>>;
}

/// Remote document storage capability.
pub trait DocumentStore: Send + Sync {
    fn upload<'a>(&'a self, upload: DocumentUpload)
    -> BoxFuture<'a, TransportResult<DocumentRef>>;
}
