use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use snafu::ResultExt;
use tutor_session::{
    Assistant, AssistantReply, AssistantRequest, BoxFuture, DocumentId, DocumentRef,
    DocumentStore, DocumentUpload, TransportFailure, TransportResult,
};

use crate::error::{
    BuildClientSnafu, ClientError, ClientResult, DecodeResponseSnafu, UnexpectedStatusSnafu,
    UploadRejectedSnafu,
};
use crate::wire::{ChatRequestBody, ChatResponseBody, UploadResponseBody};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const FALLBACK_REPLY: &str = "I understood your question. Let me help you.";

const CHAT_PATH: &str = "chat/send";
const UPLOAD_PATH: &str = "document/upload";
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

/// Adapter for the tutoring backend's HTTP API.
///
/// Implements both [`Assistant`] and [`DocumentStore`]; clones share one
/// connection pool.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub async fn send_chat(&self, request: &AssistantRequest) -> ClientResult<AssistantReply> {
        let endpoint = self.config.endpoint(CHAT_PATH);
        let body = ChatRequestBody::from_request(request);

        let response = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| request_error("send-chat-request", &endpoint, error))?;
        let body = read_success_body(&endpoint, response).await?;

        let parsed: ChatResponseBody = serde_json::from_str(&body).context(DecodeResponseSnafu {
            stage: "decode-chat-response",
            endpoint: endpoint.clone(),
        })?;
        let text = parsed.into_reply_text().unwrap_or_else(|| {
            tracing::debug!(endpoint = %endpoint, "chat response carried no text, using fallback");
            FALLBACK_REPLY.to_string()
        });

        Ok(AssistantReply::new(text))
    }

    pub async fn upload_document(&self, upload: DocumentUpload) -> ClientResult<DocumentRef> {
        let endpoint = self.config.endpoint(UPLOAD_PATH);
        let DocumentUpload { file_name, bytes } = upload;
        let byte_count = bytes.len() as u64;

        let part = Part::bytes(bytes).file_name(file_name.clone());
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|error| request_error("send-upload-request", &endpoint, error))?;
        let body = read_success_body(&endpoint, response).await?;

        let parsed: UploadResponseBody =
            serde_json::from_str(&body).context(DecodeResponseSnafu {
                stage: "decode-upload-response",
                endpoint: endpoint.clone(),
            })?;
        if !parsed.is_success() {
            return UploadRejectedSnafu {
                stage: "check-upload-status",
                file_name,
                status: parsed.status.unwrap_or_default(),
                message: parsed.message.unwrap_or_default(),
            }
            .fail();
        }

        let media_kind = parsed
            .file_type
            .filter(|kind| !kind.trim().is_empty())
            .unwrap_or_else(|| local_extension(&file_name));
        let display_name = parsed
            .filename
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(file_name);

        Ok(DocumentRef::new(
            DocumentId::new_v7(),
            display_name,
            parsed.size.unwrap_or(byte_count),
            media_kind,
        ))
    }
}

impl Assistant for HttpBackend {
    fn respond<'a>(
        &'a self,
        request: AssistantRequest,
    ) -> BoxFuture<'a, TransportResult<AssistantReply>> {
        Box::pin(async move {
            self.send_chat(&request)
                .await
                .map_err(|error| TransportFailure::new("assistant", error))
        })
    }
}

impl DocumentStore for HttpBackend {
    fn upload<'a>(
        &'a self,
        upload: DocumentUpload,
    ) -> BoxFuture<'a, TransportResult<DocumentRef>> {
        Box::pin(async move {
            self.upload_document(upload)
                .await
                .map_err(|error| TransportFailure::new("documents", error))
        })
    }
}

async fn read_success_body(endpoint: &str, response: reqwest::Response) -> ClientResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|error| request_error("read-response-body", endpoint, error))?;

    if !status.is_success() {
        return UnexpectedStatusSnafu {
            stage: "check-response-status",
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        }
        .fail();
    }

    Ok(body)
}

fn request_error(stage: &'static str, endpoint: &str, error: reqwest::Error) -> ClientError {
    let endpoint = endpoint.to_string();
    if error.is_timeout() {
        ClientError::Timeout {
            stage,
            endpoint,
            source: error,
        }
    } else {
        ClientError::SendRequest {
            stage,
            endpoint,
            source: error,
        }
    }
}

fn local_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
