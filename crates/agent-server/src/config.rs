//! Server Configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).

use std::path::PathBuf;

use agent_core::session::DEFAULT_MODEL;
use agent_runtime::GEMINI_MODELS;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a positive integer (got '{value}')")]
    NotPositive { name: &'static str, value: String },

    #[error("DEFAULT_MODEL '{0}' is not one of the offered models")]
    UnknownModel(String),
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Directory holding the built WASM UI
    pub static_dir: PathBuf,

    /// Sessions idle longer than this are dropped
    pub session_idle_minutes: i64,

    /// Model options shown in the sidebar, in display order
    pub models: Vec<String>,

    /// Selected model of a new session
    pub default_model: String,

    pub max_iterations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            static_dir: PathBuf::from("static"),
            session_idle_minutes: 120,
            models: GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
            default_model: DEFAULT_MODEL.into(),
            max_iterations: 15,
        }
    }
}

/// Parse `value` as a number above zero; unset means `default`
fn positive<T: std::str::FromStr + PartialOrd + Default>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) if parsed > T::default() => Ok(parsed),
            _ => Err(ConfigError::NotPositive { name, value }),
        },
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_model = var("DEFAULT_MODEL").unwrap_or(defaults.default_model);
        let default_model = default_model
            .strip_prefix("models/")
            .unwrap_or(&default_model)
            .to_string();
        if !defaults.models.contains(&default_model) {
            return Err(ConfigError::UnknownModel(default_model));
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            session_idle_minutes: positive(
                "SESSION_IDLE_MINUTES",
                var("SESSION_IDLE_MINUTES"),
                defaults.session_idle_minutes,
            )?,
            max_iterations: positive(
                "AGENT_MAX_ITERATIONS",
                var("AGENT_MAX_ITERATIONS"),
                defaults.max_iterations,
            )?,
            default_model,
            models: defaults.models,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.default_model, "gemini-1.5-pro");
        assert_eq!(config.session_idle_minutes, 120);
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.models.len(), 4);
    }

    #[test]
    fn test_positive_rejects_bad_values() {
        assert_eq!(positive::<i64>("X", None, 7).unwrap(), 7);
        assert_eq!(positive::<i64>("X", Some(" 30 ".into()), 7).unwrap(), 30);
        for bad in ["abc", "0", "-5", ""] {
            let err = positive::<i64>("X", Some(bad.into()), 7).unwrap_err();
            assert!(matches!(err, ConfigError::NotPositive { name: "X", .. }), "{bad}");
        }
        assert!(positive::<usize>("X", Some("-1".into()), 15).is_err());
    }

    #[test]
    fn test_numeric_vars_validated() {
        assert!(matches!(
            config(&[("AGENT_MAX_ITERATIONS", "0")]),
            Err(ConfigError::NotPositive { name: "AGENT_MAX_ITERATIONS", .. })
        ));
        assert!(matches!(
            config(&[("SESSION_IDLE_MINUTES", "soon")]),
            Err(ConfigError::NotPositive { name: "SESSION_IDLE_MINUTES", .. })
        ));
        assert_eq!(config(&[("AGENT_MAX_ITERATIONS", "4")]).unwrap().max_iterations, 4);
    }

    #[test]
    fn test_default_model_must_be_offered() {
        assert!(matches!(
            config(&[("DEFAULT_MODEL", "gpt-4o")]),
            Err(ConfigError::UnknownModel(model)) if model == "gpt-4o"
        ));
        let config = config(&[("DEFAULT_MODEL", "models/gemini-2.0-flash")]).unwrap();
        assert_eq!(config.default_model, "gemini-2.0-flash");
    }
}
