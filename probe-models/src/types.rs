//! Core types for model naming.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified model name in format `provider/model`.
///
/// The provider portion selects the retry classification table; the model
/// portion is passed through to the provider untouched and may itself
/// contain slashes (e.g. `openai/azure/gpt-4o`).
///
/// # Examples
///
/// ```
/// use probe_models::ModelName;
///
/// let name = ModelName::new("openai", "gpt-4o");
/// assert_eq!(name.provider(), "openai");
/// assert_eq!(name.model(), "gpt-4o");
/// assert_eq!(name.to_string(), "openai/gpt-4o");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    /// Create a model name from provider and model parts.
    pub fn new(provider: &str, model: &str) -> Self {
        Self(format!("{provider}/{model}"))
    }

    /// Parse a model name from a string in `provider/model` format.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once('/') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Some(Self(s.to_string()))
            }
            _ => None,
        }
    }

    /// Get the provider portion of the name.
    pub fn provider(&self) -> &str {
        self.0.split('/').next().unwrap_or("")
    }

    /// Get the model portion of the name (everything after the first `/`).
    pub fn model(&self) -> &str {
        self.0.split_once('/').map(|(_, m)| m).unwrap_or("")
    }

    /// Get the full name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_new_creates_correct_format() {
        let name = ModelName::new("anthropic", "claude-sonnet-4");
        assert_eq!(name.to_string(), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn model_name_parse_extracts_parts() {
        let name = ModelName::parse("openai/gpt-4o").unwrap();
        assert_eq!(name.provider(), "openai");
        assert_eq!(name.model(), "gpt-4o");
    }

    #[test]
    fn model_name_keeps_nested_model_path() {
        let name = ModelName::parse("openai/azure/gpt-4o").unwrap();
        assert_eq!(name.provider(), "openai");
        assert_eq!(name.model(), "azure/gpt-4o");
    }

    #[test]
    fn model_name_parse_returns_none_for_invalid() {
        assert!(ModelName::parse("invalid").is_none());
        assert!(ModelName::parse("/gpt-4o").is_none());
        assert!(ModelName::parse("openai/").is_none());
    }

    #[test]
    fn model_name_serializes_as_string() {
        let name = ModelName::new("google", "gemini-2.0-flash");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"google/gemini-2.0-flash\"");
    }
}
