// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tripdesk_app::HeaderPolicy;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_PASSWORD_ENV: &str = "TRIPDESK_PASSWORD";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub import: Import,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            backend: Backend::default(),
            import: Import::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    #[serde(default)]
    pub kind: BackendKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub password_env: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            base_url: None,
            api_key: None,
            email: None,
            password_env: Some(DEFAULT_PASSWORD_ENV.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Import {
    pub allow_extra_columns: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

/// Connection settings for the hosted backend, resolved from `[backend]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: String,
    pub email: String,
    pub password_env: String,
    pub timeout: Duration,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("TRIPDESK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set TRIPDESK_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(tripdesk_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [storage], [backend], [import], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            tripdesk_db::validate_db_path(db_path)?;
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if self.backend.kind == BackendKind::Remote {
            self.remote_settings().with_context(|| {
                format!("invalid [backend] section in {}", path.display())
            })?;
        }

        if let Some(level) = &self.log.level {
            tracing_subscriber::EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {level:?} in {} is not a valid filter; use error, warn, info, debug, or trace",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => tripdesk_db::default_db_path(),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind
    }

    pub fn remote_settings(&self) -> Result<RemoteSettings> {
        let backend = &self.backend;
        let base_url = required(backend.base_url.as_deref(), "backend.base_url")?;
        let api_key = required(backend.api_key.as_deref(), "backend.api_key")?;
        let email = required(backend.email.as_deref(), "backend.email")?;
        let password_env = backend
            .password_env
            .as_deref()
            .unwrap_or(DEFAULT_PASSWORD_ENV)
            .trim();
        if password_env.is_empty() {
            bail!("backend.password_env must name an environment variable");
        }

        Ok(RemoteSettings {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            email: email.to_owned(),
            password_env: password_env.to_owned(),
            timeout: self.backend_timeout()?,
        })
    }

    pub fn backend_timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn header_policy(&self) -> HeaderPolicy {
        if self.import.allow_extra_columns.unwrap_or(false) {
            HeaderPolicy::Lenient
        } else {
            HeaderPolicy::Strict
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# tripdesk config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/tripdesk/tripdesk.db)\n# db_path = \"/absolute/path/to/tripdesk.db\"\n\n[backend]\n# \"local\" keeps trips in the SQLite file above; \"remote\" uses the hosted backend.\nkind = \"local\"\n# base_url = \"https://project.example.co\"\n# api_key = \"public-anon-key\"\n# email = \"ops@example.com\"\n# The password is read from this environment variable, never from the file.\npassword_env = \"{}\"\ntimeout = \"{}\"\n\n[import]\n# Ignore columns outside the trip schema instead of rejecting the file.\nallow_extra_columns = false\n\n[log]\n# Overridden by TRIPDESK_LOG.\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_PASSWORD_ENV,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{key} is required when backend.kind = \"remote\""),
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;
    use tripdesk_app::HeaderPolicy;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.backend_kind(), BackendKind::Local);
        assert_eq!(config.header_policy(), HeaderPolicy::Strict);
        assert_eq!(config.log_level(), "warn");
        assert_eq!(config.backend_timeout()?, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nkind = \"local\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[storage], [backend], [import], and [log]"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 7\n")?;
        let error = Config::load(&path).expect_err("v7 config should fail");
        assert!(error.to_string().contains("unsupported config version 7"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn remote_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nkind = \"remote\"\nbase_url = \"https://trips.example.co//\"\napi_key = \"anon\"\nemail = \"ops@example.com\"\npassword_env = \"OPS_PASSWORD\"\ntimeout = \"2s\"\n[import]\nallow_extra_columns = true\n[log]\nlevel = \"debug\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.backend_kind(), BackendKind::Remote);
        let remote = config.remote_settings()?;
        assert_eq!(remote.base_url, "https://trips.example.co");
        assert_eq!(remote.email, "ops@example.com");
        assert_eq!(remote.password_env, "OPS_PASSWORD");
        assert_eq!(remote.timeout, Duration::from_secs(2));
        assert_eq!(config.header_policy(), HeaderPolicy::Lenient);
        assert_eq!(config.log_level(), "debug");
        Ok(())
    }

    #[test]
    fn remote_backend_requires_connection_fields() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[backend]\nkind = \"remote\"\napi_key = \"anon\"\n")?;
        let error = Config::load(&path).expect_err("remote config without url should fail");
        let message = format!("{error:#}");
        assert!(message.contains("invalid [backend] section"));
        assert!(message.contains("backend.base_url is required"));
        Ok(())
    }

    #[test]
    fn unknown_backend_kind_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nkind = \"cloud\"\n")?;
        let error = Config::load(&path).expect_err("unknown backend kind should fail");
        assert!(error.to_string().contains("decode config"));
        Ok(())
    }

    #[test]
    fn invalid_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"tripdesk=loud\"\n")?;
        let error = Config::load(&path).expect_err("bad log filter should fail");
        assert!(error.to_string().contains("not a valid filter"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("TRIPDESK_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("TRIPDESK_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("TRIPDESK_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("TRIPDESK_DB_PATH");
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("TRIPDESK_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("TRIPDESK_DB_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"https://evil.example/trips.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        let message = error.to_string();
        assert!(
            message.contains("looks like a URI") || message.contains("filesystem path"),
            "unexpected message: {message}"
        );
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn timeout_rejects_non_positive_values_in_config() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn example_config_loads_back() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[backend]"));
        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend_kind(), BackendKind::Local);
        Ok(())
    }
}
