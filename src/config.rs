use crate::api_url::resolve_api_base_url;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const TOKEN_KEY: &str = "STRATENV_TOKEN";
pub const SESSION_FILE_KEY: &str = "STRATENV_SESSION_FILE";
pub const TIMEOUT_KEY: &str = "STRATENV_TIMEOUT_SECS";
const SETTING_PREFIX: &str = "STRATENV_";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    /// Takes precedence over the token stored in the session file.
    pub token: Option<String>,
    pub session_file: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ClientSettings {
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let api_base_url = resolve_api_base_url(settings)?;
        let token = optional_setting(settings, TOKEN_KEY).map(str::to_string);
        let session_file = optional_setting(settings, SESSION_FILE_KEY).map(PathBuf::from);
        let timeout = match optional_setting(settings, TIMEOUT_KEY) {
            Some(_) => Some(Duration::from_secs_f64(require_setting_f64(
                settings,
                TIMEOUT_KEY,
                Some(0.001),
                None,
            )?)),
            None => None,
        };

        Ok(Self {
            api_base_url,
            token,
            session_file,
            timeout,
        })
    }

    /// Reads `STRATENV_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(SETTING_PREFIX))
            .collect();
        Self::from_settings_map(&settings)
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn require_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    optional_setting(settings, key).ok_or_else(|| anyhow!("Missing required setting {}", key))
}

fn require_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<f64> {
    let raw = require_setting(settings, key)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(anyhow!(
                "Setting {} must be >= {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_url::{API_URL_KEY, DEFAULT_API_URL};

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let parsed = ClientSettings::from_settings_map(&HashMap::new()).unwrap();
        assert_eq!(parsed.api_base_url, DEFAULT_API_URL);
        assert_eq!(parsed.token, None);
        assert_eq!(parsed.session_file, None);
        assert_eq!(parsed.timeout, None);
    }

    #[test]
    fn reads_every_setting() {
        let parsed = ClientSettings::from_settings_map(&settings(&[
            (API_URL_KEY, "backtest.example.com/"),
            (TOKEN_KEY, " tok "),
            (SESSION_FILE_KEY, "/tmp/session.json"),
            (TIMEOUT_KEY, "2.5"),
        ]))
        .unwrap();
        assert_eq!(parsed.api_base_url, "https://backtest.example.com");
        assert_eq!(parsed.token.as_deref(), Some("tok"));
        assert_eq!(parsed.session_file, Some(PathBuf::from("/tmp/session.json")));
        assert_eq!(parsed.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn rejects_bad_timeout_and_url() {
        let err = ClientSettings::from_settings_map(&settings(&[(TIMEOUT_KEY, "soon")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Setting STRATENV_TIMEOUT_SECS must be a number (value: soon)"
        );
        assert!(ClientSettings::from_settings_map(&settings(&[(TIMEOUT_KEY, "0")])).is_err());
        assert!(
            ClientSettings::from_settings_map(&settings(&[(API_URL_KEY, "ftp://host")])).is_err()
        );
    }
}
