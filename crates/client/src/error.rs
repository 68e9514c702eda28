use snafu::Snafu;

/// Failures of the HTTP backend adapter.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {endpoint} timed out on `{stage}`: {source}"))]
    Timeout {
        stage: &'static str,
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("request to {endpoint} failed on `{stage}`: {source}"))]
    SendRequest {
        stage: &'static str,
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("{endpoint} answered with status {status} on `{stage}`: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode response from {endpoint} on `{stage}`: {source}"))]
    DecodeResponse {
        stage: &'static str,
        endpoint: String,
        source: serde_json::Error,
    },
    #[snafu(display("backend rejected upload of '{file_name}' with status '{status}': {message}"))]
    UploadRejected {
        stage: &'static str,
        file_name: String,
        status: String,
        message: String,
    },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// HTTP status of a non-success response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
