#![deny(unsafe_code)]

//! HTTP adapter connecting the session core to the tutoring backend.

pub mod backend;
pub mod error;
mod wire;

pub use backend::{BackendConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, FALLBACK_REPLY, HttpBackend};
pub use error::{ClientError, ClientResult};
