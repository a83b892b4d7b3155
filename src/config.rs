//! Runtime settings from the environment, secret files and a credentials
//! document.
//!
//! Credentials are resolved field by field, first match wins:
//!
//! 1. the credentials JSON file (`MANGADEX_CREDENTIALS_FILE`, default
//!    `/app/config/mangadex_credentials.json`),
//! 2. `/run/secrets/mangadex_{field}`,
//! 3. `MANGADEX_{FIELD}` environment variables.
//!
//! Empty values count as absent at every step. A missing or malformed
//! credentials file is not an error; it is logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::api::constants::{DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL, DEFAULT_UPLOADS_BASE_URL};
use crate::api::{ClientConfig, Credentials};
use crate::download::FetchSettings;
use crate::library::KomgaConfig;
use crate::pipeline::{DEFAULT_LANGUAGE, PipelineOptions};
use crate::user_agent::default_user_agent;

/// Default location of the credentials document.
pub const DEFAULT_CREDENTIALS_FILE: &str = "/app/config/mangadex_credentials.json";

/// Directory holding one file per secret.
pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

const DEFAULT_LIBRARY_ROOT: &str = "/library";
const DEFAULT_WORK_DIR: &str = "/app/data";

/// Errors raised while loading [`Settings`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Content API client settings, credentials included.
    pub client: ClientConfig,
    /// Download pipeline settings.
    pub pipeline: PipelineOptions,
    /// Library server connection.
    pub komga: KomgaConfig,
    /// `LOG_LEVEL`, when set.
    pub log_level: Option<String>,
}

/// Shape of the credentials document.
#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
}

impl Settings {
    /// Loads settings from the process environment and the default secret
    /// locations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(
            |name| std::env::var(name).ok(),
            Path::new(DEFAULT_SECRETS_DIR),
        )
    }

    /// Loads settings through `lookup` (variable name to value) with secret
    /// files read from `secrets_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F, secrets_dir: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let credentials_path = var("MANGADEX_CREDENTIALS_FILE")
            .map_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE), PathBuf::from);
        let file = read_credentials_file(&credentials_path);
        let resolve = |from_file: Option<String>, field: &str| {
            non_empty(from_file)
                .or_else(|| read_secret(&secrets_dir.join(format!("mangadex_{field}"))))
                .or_else(|| var(&format!("MANGADEX_{}", field.to_ascii_uppercase())))
        };
        let credentials = Credentials {
            token: resolve(file.token, "token"),
            username: resolve(file.username, "username"),
            password: resolve(file.password, "password"),
            client_id: resolve(file.client_id, "client_id"),
            client_secret: resolve(file.client_secret, "client_secret"),
        };

        let client = ClientConfig {
            api_base_url: url_var(&var, "MANGADEX_BASE_URL", DEFAULT_API_BASE_URL)?,
            token_url: url_var(&var, "MANGADEX_AUTH_URL", DEFAULT_TOKEN_URL)?,
            user_agent: var("USER_AGENT").unwrap_or_else(default_user_agent),
            credentials,
            ..ClientConfig::default()
        };

        let pipeline = PipelineOptions {
            library_root: var("LIBRARY_ROOT")
                .map_or_else(|| PathBuf::from(DEFAULT_LIBRARY_ROOT), PathBuf::from),
            work_dir: var("WORK_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_WORK_DIR), PathBuf::from),
            default_language: var("LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            uploads_base_url: url_var(&var, "MANGADEX_UPLOADS_URL", DEFAULT_UPLOADS_BASE_URL)?,
            fetch: FetchSettings {
                prefer_reduced: bool_var(&var, "USE_DATASAVER", false)?,
                ..FetchSettings::default()
            },
            auto_scan: bool_var(&var, "AUTO_SCAN", true)?,
        };

        let komga = KomgaConfig {
            base_url: var("KOMGA_BASE_URL"),
            library_id: var("KOMGA_LIBRARY_ID"),
            token: var("KOMGA_TOKEN"),
        };

        Ok(Self {
            client,
            pipeline,
            komga,
            log_level: var("LOG_LEVEL"),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_secret(path: &Path) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    debug!(path = %path.display(), "read secret file");
    non_empty(Some(value))
}

fn read_credentials_file(path: &Path) -> CredentialsFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return CredentialsFile::default();
    };
    serde_json::from_str(&raw).unwrap_or_else(|error| {
        warn!(path = %path.display(), error = %error, "ignoring malformed credentials file");
        CredentialsFile::default()
    })
}

fn url_var<V>(var: &V, name: &'static str, default: &str) -> Result<String, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let Some(value) = var(name) else {
        return Ok(default.to_string());
    };
    match Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(value.trim().trim_end_matches('/').to_string())
        }
        _ => Err(ConfigError::InvalidValue {
            name,
            value,
            reason: "expected an http(s) URL",
        }),
    }
}

fn bool_var<V>(var: &V, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let Some(value) = var(name) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value,
            reason: "expected true or false",
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], secrets_dir: &Path) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|name| env.get(name).cloned(), secrets_dir)
    }

    #[test]
    fn test_defaults_without_environment() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let settings = load(
            &[("MANGADEX_CREDENTIALS_FILE", missing.to_str().unwrap())],
            dir.path(),
        )
        .unwrap();

        assert_eq!(settings.client.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.client.token_url, DEFAULT_TOKEN_URL);
        assert!(settings.client.credentials.is_anonymous());
        assert_eq!(settings.pipeline.library_root, PathBuf::from("/library"));
        assert_eq!(settings.pipeline.work_dir, PathBuf::from("/app/data"));
        assert_eq!(settings.pipeline.default_language, "en");
        assert!(!settings.pipeline.fetch.prefer_reduced);
        assert!(settings.pipeline.auto_scan);
        assert!(!settings.komga.is_complete());
        assert_eq!(settings.log_level, None);
    }

    #[test]
    fn test_environment_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let settings = load(
            &[
                ("MANGADEX_CREDENTIALS_FILE", missing.to_str().unwrap()),
                ("MANGADEX_BASE_URL", "http://localhost:8080/"),
                ("LIBRARY_ROOT", "/srv/comics"),
                ("LANGUAGE", "fr"),
                ("USE_DATASAVER", "TRUE"),
                ("AUTO_SCAN", "false"),
                ("KOMGA_BASE_URL", "http://komga:25600"),
                ("KOMGA_LIBRARY_ID", "lib"),
                ("KOMGA_TOKEN", "secret"),
                ("LOG_LEVEL", "debug"),
            ],
            dir.path(),
        )
        .unwrap();

        assert_eq!(settings.client.api_base_url, "http://localhost:8080");
        assert_eq!(settings.pipeline.library_root, PathBuf::from("/srv/comics"));
        assert_eq!(settings.pipeline.default_language, "fr");
        assert!(settings.pipeline.fetch.prefer_reduced);
        assert!(!settings.pipeline.auto_scan);
        assert!(settings.komga.is_complete());
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_credentials_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("creds.json");
        fs::write(&file, r#"{"username": "from-file", "password": ""}"#).unwrap();
        fs::write(dir.path().join("mangadex_password"), "from-secret\n").unwrap();
        fs::write(dir.path().join("mangadex_username"), "ignored-secret").unwrap();

        let settings = load(
            &[
                ("MANGADEX_CREDENTIALS_FILE", file.to_str().unwrap()),
                ("MANGADEX_USERNAME", "ignored-env"),
                ("MANGADEX_CLIENT_ID", "from-env"),
            ],
            dir.path(),
        )
        .unwrap();

        let credentials = settings.client.credentials;
        assert_eq!(credentials.username.as_deref(), Some("from-file"));
        assert_eq!(credentials.password.as_deref(), Some("from-secret"));
        assert_eq!(credentials.client_id.as_deref(), Some("from-env"));
        assert_eq!(credentials.client_secret, None);
        assert!(!credentials.has_password_grant());
    }

    #[test]
    fn test_malformed_credentials_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("creds.json");
        fs::write(&file, "not json").unwrap();

        let settings = load(
            &[
                ("MANGADEX_CREDENTIALS_FILE", file.to_str().unwrap()),
                ("MANGADEX_TOKEN", "tok"),
            ],
            dir.path(),
        )
        .unwrap();
        assert_eq!(settings.client.credentials.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&[("AUTO_SCAN", "maybe")], dir.path()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "AUTO_SCAN",
                value: "maybe".to_string(),
                reason: "expected true or false",
            }
        );

        let err = load(&[("MANGADEX_BASE_URL", "ftp://x")], dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "MANGADEX_BASE_URL",
                ..
            }
        ));
    }
}
