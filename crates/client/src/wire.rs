//! JSON bodies exchanged with the tutoring backend.

use serde::{Deserialize, Serialize};
use tutor_session::{AssistantRequest, DocumentRef};

pub const UPLOAD_SUCCESS_STATUS: &str = "success";

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequestBody<'a> {
    pub message: &'a str,
    pub use_rag: bool,
    pub selected_document: Option<SelectedDocumentBody<'a>>,
}

impl<'a> ChatRequestBody<'a> {
    pub fn from_request(request: &'a AssistantRequest) -> Self {
        Self {
            message: &request.text,
            use_rag: request.use_grounding,
            selected_document: request
                .grounding
                .as_ref()
                .map(SelectedDocumentBody::from_document),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SelectedDocumentBody<'a> {
    pub id: String,
    pub name: &'a str,
    pub size: u64,
    #[serde(rename = "type")]
    pub media_kind: &'a str,
}

impl<'a> SelectedDocumentBody<'a> {
    fn from_document(document: &'a DocumentRef) -> Self {
        Self {
            id: document.id.to_string(),
            name: &document.display_name,
            size: document.byte_size,
            media_kind: &document.media_kind,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatResponseBody {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatResponseBody {
    /// First non-blank of `response` and `message`.
    pub fn into_reply_text(self) -> Option<String> {
        [self.response, self.message]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UploadResponseBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadResponseBody {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(UPLOAD_SUCCESS_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_text_prefers_response_then_message() {
        let body: ChatResponseBody =
            serde_json::from_str(r#"{"response":"Use exit tickets.","message":"ignored"}"#)
                .unwrap();
        assert_eq!(body.into_reply_text().as_deref(), Some("Use exit tickets."));

        let body: ChatResponseBody =
            serde_json::from_str(r#"{"response":"  ","message":"Try think-pair-share."}"#)
                .unwrap();
        assert_eq!(
            body.into_reply_text().as_deref(),
            Some("Try think-pair-share.")
        );

        let body: ChatResponseBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.into_reply_text(), None);
    }

    #[test]
    fn ungrounded_request_serializes_null_document() {
        let request = AssistantRequest::new("How do I pace a unit?", None);
        let value = serde_json::to_value(ChatRequestBody::from_request(&request)).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "message": "How do I pace a unit?",
                "use_rag": false,
                "selected_document": null,
            })
        );
    }

    #[test]
    fn upload_status_must_be_success() {
        let body: UploadResponseBody =
            serde_json::from_str(r#"{"status":"error","message":"bad file"}"#).unwrap();
        assert!(!body.is_success());

        let body: UploadResponseBody = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(body.is_success());
    }
}
