use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tutor_client::{BackendConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use tutor_session::{DEFAULT_GREETING, SessionContext};

pub const SETTINGS_DIRECTORY_NAME: &str = "tutor";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "TUTOR_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            greeting: default_greeting(),
        }
    }
}

impl ClientSettings {
    pub fn normalized(mut self) -> Self {
        self.base_url = if self.base_url.trim().is_empty() {
            default_base_url()
        } else {
            self.base_url.trim().to_string()
        };
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        self.greeting = if self.greeting.trim().is_empty() {
            default_greeting()
        } else {
            self.greeting.trim().to_string()
        };

        self
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(
            self.base_url.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext::default().with_greeting(self.greeting.clone())
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".tutor"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ClientSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    /// Writes the current settings out when no file exists yet, so there is
    /// something on disk to edit.
    pub fn ensure_persisted(&self) -> Result<(), SettingsError> {
        let exists = self.config_path.try_exists().context(InspectFileSnafu {
            stage: "check-client-settings-file",
            path: self.config_path.clone(),
        })?;
        if exists {
            return Ok(());
        }

        tracing::info!(
            path = %self.config_path.display(),
            "seeding settings file with defaults"
        );
        self.update(ClientSettings::clone(&self.settings()))
    }

    fn load_from_disk(path: &Path) -> ClientSettings {
        let mut figment = Figment::from(Serialized::defaults(ClientSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!(path = %path.display(), "settings file not found, using defaults");
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        match figment.extract::<ClientSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "failed to parse settings, using defaults"
                );
                ClientSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ClientSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-client-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "encode-client-settings",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-client-settings-staging-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "swap-in-client-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = %self.config_path.display(), "client settings written");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot tell whether {path:?} exists on `{stage}`: {source}"))]
    InspectFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("could not create config directory {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("could not encode client settings as json on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("could not write {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("could not move {from:?} over {to:?} on `{stage}`: {source}"))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    // Every store is built inside a `Jail` so `TUTOR_` variables set by one
    // test never leak into another.

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));

            assert_eq!(store.settings().base_url, DEFAULT_BASE_URL);
            assert_eq!(store.settings().request_timeout_secs, 30);
            assert_eq!(store.settings().greeting, DEFAULT_GREETING);
            Ok(())
        });
    }

    #[test]
    fn partial_file_is_merged_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "base_url": " http://school.example/api " }"#,
            )?;

            let settings =
                SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME)).settings();
            assert_eq!(settings.base_url, "http://school.example/api");
            assert_eq!(settings.request_timeout_secs, 30);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE_NAME, r#"{ "request_timeout_secs": 5 }"#)?;
            jail.set_env("TUTOR_REQUEST_TIMEOUT_SECS", "45");
            jail.set_env("TUTOR_GREETING", "Good morning, Room 12.");

            let settings =
                SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME)).settings();
            assert_eq!(settings.request_timeout_secs, 45);
            assert_eq!(settings.greeting, "Good morning, Room 12.");
            assert_eq!(settings.base_url, DEFAULT_BASE_URL);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE_NAME, "{ not json")?;

            assert_eq!(
                *SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME)).settings(),
                ClientSettings::default()
            );
            Ok(())
        });
    }

    #[test]
    fn update_persists_normalized_settings() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join(SETTINGS_FILE_NAME);
            let store = SettingsStore::new(path.clone());

            store
                .update(ClientSettings {
                    base_url: "   ".to_string(),
                    request_timeout_secs: 0,
                    greeting: " Welcome back, Ms. Rivera. ".to_string(),
                })
                .unwrap();

            let expected = ClientSettings {
                greeting: "Welcome back, Ms. Rivera.".to_string(),
                ..ClientSettings::default()
            };
            assert_eq!(*store.settings(), expected);
            assert!(!path.with_extension("json.tmp").exists());
            assert_eq!(*SettingsStore::new(path).settings(), expected);
            Ok(())
        });
    }

    #[test]
    fn ensure_persisted_only_writes_once() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join(SETTINGS_FILE_NAME);
            let store = SettingsStore::new(path.clone());

            store.ensure_persisted().unwrap();
            assert!(path.exists());

            jail.create_file(SETTINGS_FILE_NAME, r#"{ "request_timeout_secs": 5 }"#)?;
            store.ensure_persisted().unwrap();
            assert_eq!(SettingsStore::new(path).settings().request_timeout_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn ensure_persisted_reports_an_uninspectable_path() {
        Jail::expect_with(|jail| {
            jail.create_file("not-a-directory", "plain file")?;
            let path = jail
                .directory()
                .join("not-a-directory")
                .join(SETTINGS_FILE_NAME);

            let error = SettingsStore::new(path).ensure_persisted().unwrap_err();
            assert!(matches!(error, SettingsError::InspectFile { .. }));
            Ok(())
        });
    }

    #[test]
    fn settings_feed_backend_and_session() {
        let settings = ClientSettings {
            base_url: "http://school.example/api/".to_string(),
            request_timeout_secs: 12,
            greeting: "Hi there.".to_string(),
        };

        let backend = settings.backend_config();
        assert_eq!(backend.base_url, "http://school.example/api");
        assert_eq!(backend.timeout, Duration::from_secs(12));
        assert_eq!(settings.session_context().greeting, "Hi there.");
    }
}
