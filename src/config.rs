//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default model used for the mentor persona.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// How the writes of a single turn are applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitStrategy {
    /// Every write of the turn goes through one database transaction.
    #[default]
    Transactional,
    /// Conversation and stage pointer writes are required; ledger, project
    /// and event writes are attempted individually and only logged on failure.
    BestEffort,
}

impl FromStr for CommitStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transactional" => Ok(Self::Transactional),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(ConfigError::InvalidValue {
                key: "MENTOR_COMMIT_STRATEGY".to_string(),
                message: format!("expected `transactional` or `best_effort`, got `{other}`"),
            }),
        }
    }
}

/// Behaviour of the mentor orchestrator.
#[derive(Debug, Clone)]
pub struct MentorConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Maximum tokens per mentor reply.
    pub max_tokens: u32,
    /// Number of most recent messages replayed to the model.
    pub history_window: usize,
    /// How turn writes are committed.
    pub commit_strategy: CommitStrategy,
}

impl Default for MentorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            history_window: 20,
            commit_strategy: CommitStrategy::default(),
        }
    }
}

/// Process configuration for the `checkpoint-mentor` binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: SecretString,
    pub db_path: PathBuf,
    pub port: u16,
    pub mentor: MentorConfig,
}

impl AppConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;

        let defaults = MentorConfig::default();
        let mentor = MentorConfig {
            model: lookup("MENTOR_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_or(&lookup, "MENTOR_MAX_TOKENS", defaults.max_tokens)?,
            history_window: parse_or(&lookup, "MENTOR_HISTORY_WINDOW", defaults.history_window)?,
            commit_strategy: match lookup("MENTOR_COMMIT_STRATEGY") {
                Some(raw) => raw.parse()?,
                None => defaults.commit_strategy,
            },
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            db_path: lookup("MENTOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/mentor.db")),
            port: parse_or(&lookup, "MENTOR_PORT", 8080)?,
            mentor,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = AppConfig::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.api_key.expose_secret(), "sk-test");
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("./data/mentor.db"));
        assert_eq!(config.mentor.model, DEFAULT_MODEL);
        assert_eq!(config.mentor.max_tokens, 1024);
        assert_eq!(config.mentor.history_window, 20);
        assert_eq!(config.mentor.commit_strategy, CommitStrategy::Transactional);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "ANTHROPIC_API_KEY"));

        let err = AppConfig::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("MENTOR_PORT", "9000"),
            ("MENTOR_HISTORY_WINDOW", "6"),
            ("MENTOR_COMMIT_STRATEGY", "best_effort"),
            ("MENTOR_DB_PATH", "/tmp/m.db"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.mentor.history_window, 6);
        assert_eq!(config.mentor.commit_strategy, CommitStrategy::BestEffort);
        assert_eq!(config.db_path, PathBuf::from("/tmp/m.db"));
    }

    #[test]
    fn invalid_values_name_the_key() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("MENTOR_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MENTOR_PORT"));

        let err = "sometimes".parse::<CommitStrategy>().unwrap_err();
        assert!(err.to_string().contains("MENTOR_COMMIT_STRATEGY"));
    }
}
