use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Runtime configuration, read once at startup and handed to the services that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub branch_timeout: Duration,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            branch_timeout: Duration::from_secs(90),
            port: 8080,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let branch_timeout = match non_empty("BRANCH_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("BRANCH_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"))?,
            ),
            None => defaults.branch_timeout,
        };
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got {raw:?}"))?,
            None => defaults.port,
        };

        Ok(Self {
            api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")),
            api_base: non_empty("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            text_model: non_empty("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: non_empty("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            branch_timeout,
            port,
        })
    }

    /// Key prefix safe to print in logs.
    pub fn masked_api_key(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}...", key.chars().take(6).collect::<String>()),
            None => "<unset>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(cfg.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(cfg.branch_timeout, Duration::from_secs(90));
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn gemini_key_wins_over_legacy_key() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "primary"), ("API_KEY", "legacy")])).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("primary"));

        let cfg = AppConfig::from_lookup(lookup_from(&[("API_KEY", "legacy")])).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("legacy"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "   ")])).unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.masked_api_key(), "<unset>");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("BRANCH_TIMEOUT_SECS", "-1")])).is_err());
    }

    #[test]
    fn masks_key() {
        let cfg = AppConfig { api_key: Some("AIzaSyVerySecret".into()), ..AppConfig::default() };
        assert_eq!(cfg.masked_api_key(), "AIzaSy...");
    }
}
