mod repl;
mod settings;

use std::sync::Arc;

use snafu::{ResultExt, Snafu};
use tracing_subscriber::EnvFilter;
use tutor_client::{ClientError, HttpBackend};
use tutor_session::SessionController;

use crate::settings::SettingsStore;

#[derive(Debug, Snafu)]
enum AppError {
    #[snafu(display("failed to set up the backend on `{stage}`: {source}"))]
    Backend {
        stage: &'static str,
        source: ClientError,
    },
    #[snafu(display("terminal i/o failed on `{stage}`: {source}"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Logs go to stderr so they stay out of the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    if let Err(error) = store.ensure_persisted() {
        tracing::warn!(error = %error, "could not write default settings file");
    }
    let settings = store.settings();
    tracing::info!(
        path = %store.config_path().display(),
        base_url = %settings.base_url,
        timeout_secs = settings.request_timeout_secs,
        "loaded settings"
    );

    let backend = Arc::new(HttpBackend::new(settings.backend_config()).context(BackendSnafu {
        stage: "build-http-backend",
    })?);
    let controller = Arc::new(SessionController::new(
        settings.session_context(),
        backend.clone(),
        backend,
    ));

    repl::run(controller).await.context(TerminalSnafu {
        stage: "run-terminal-loop",
    })
}
