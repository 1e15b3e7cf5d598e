use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dispatcher::FailurePolicy;

pub const DEFAULT_CONFIG_FILE: &str = "sijax.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Where requests, upload forms and comet forms are posted.
    pub request_uri: String,
    /// Origin that relative request URIs are resolved against.
    #[serde(default)]
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub failure_policy: FailurePolicy,
    /// Gates `script` commands even when a script host is installed.
    pub allow_scripts: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_uri: "/".into(),
            base_url: None,
            request_timeout_secs: 30,
            failure_policy: FailurePolicy::Continue,
            allow_scripts: false,
        }
    }
}

impl ClientConfig {
    pub fn with_request_uri(mut self, request_uri: impl Into<String>) -> Self {
        self.request_uri = request_uri.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn load_settings() -> ClientConfig {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings_from(path: &Path) -> ClientConfig {
    load_layered(path, |key| std::env::var(key).ok())
}

pub(crate) fn load_layered(path: &Path, env: impl Fn(&str) -> Option<String>) -> ClientConfig {
    let mut settings = ClientConfig::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                let lookup = |key: &str| file_cfg.get(key).and_then(setting_text);
                apply_layer(&mut settings, lookup, &path.display().to_string());
            }
            Err(err) => warn!("config: ignoring unreadable {}: {err}", path.display()),
        }
    }

    let env_layer = |key: &str| {
        let (plain, prefixed) = match key {
            "request_uri" => ("SIJAX_REQUEST_URI", "APP__REQUEST_URI"),
            "base_url" => ("SIJAX_BASE_URL", "APP__BASE_URL"),
            "request_timeout_secs" => ("SIJAX_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS"),
            "failure_policy" => ("SIJAX_FAILURE_POLICY", "APP__FAILURE_POLICY"),
            "allow_scripts" => ("SIJAX_ALLOW_SCRIPTS", "APP__ALLOW_SCRIPTS"),
            _ => return None,
        };
        env(prefixed).or_else(|| env(plain))
    };
    apply_layer(&mut settings, env_layer, "environment");

    settings
}

fn setting_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Integer(number) => Some(number.to_string()),
        toml::Value::Boolean(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn apply_layer(settings: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>, source: &str) {
    if let Some(v) = lookup("request_uri") {
        settings.request_uri = v;
    }
    if let Some(v) = lookup("base_url") {
        let trimmed = v.trim();
        settings.base_url = (!trimmed.is_empty()).then(|| trimmed.to_owned());
    }
    if let Some(v) = lookup("request_timeout_secs") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!("config: invalid request_timeout_secs={v} in {source}"),
        }
    }
    if let Some(v) = lookup("failure_policy") {
        match v.parse::<FailurePolicy>() {
            Ok(parsed) => settings.failure_policy = parsed,
            Err(err) => warn!("config: {err} in {source}"),
        }
    }
    if let Some(v) = lookup("allow_scripts") {
        match parse_flag(&v) {
            Some(parsed) => settings.allow_scripts = parsed,
            None => warn!("config: invalid allow_scripts={v} in {source}"),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure policy `{0}`, expected `continue` or `abort`")]
pub struct UnknownPolicy(pub String);

impl FromStr for FailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            _ => Err(UnknownPolicy(raw.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_layered(&dir.path().join("absent.toml"), no_env);
        assert_eq!(settings, ClientConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "request_uri = \"/sijax\"\nbase_url = \"http://app.test\"\nrequest_timeout_secs = 5\nfailure_policy = \"abort\"\nallow_scripts = true"
        )
        .expect("write config");

        let settings = load_layered(file.path(), no_env);
        assert_eq!(settings.request_uri, "/sijax");
        assert_eq!(settings.base_url.as_deref(), Some("http://app.test"));
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.failure_policy, FailurePolicy::Abort);
        assert!(settings.allow_scripts);
    }

    #[test]
    fn environment_wins_over_file_and_prefixed_wins_over_plain() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "request_uri = \"/from-file\"").expect("write config");

        let env = |key: &str| match key {
            "SIJAX_REQUEST_URI" => Some("/plain".to_owned()),
            "APP__REQUEST_URI" => Some("/prefixed".to_owned()),
            "SIJAX_ALLOW_SCRIPTS" => Some("yes".to_owned()),
            "APP__BASE_URL" => Some("http://localhost:5000".to_owned()),
            _ => None,
        };
        let settings = load_layered(file.path(), env);
        assert_eq!(settings.request_uri, "/prefixed");
        assert_eq!(settings.base_url.as_deref(), Some("http://localhost:5000"));
        assert!(settings.allow_scripts);
    }

    #[test]
    fn invalid_values_keep_previous_layer() {
        let env = |key: &str| match key {
            "SIJAX_TIMEOUT_SECS" => Some("soon".to_owned()),
            "SIJAX_FAILURE_POLICY" => Some("explode".to_owned()),
            _ => None,
        };
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_layered(&dir.path().join("none.toml"), env);
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn failure_policy_parses_case_insensitively() {
        assert_eq!("Abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
