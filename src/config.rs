//! Engine configuration.
//!
//! Configuration covers the defaults applied when a request does not say
//! otherwise (locale chain, publication mode) and the request attribute
//! names the standard plugins read from a [`RequestScope`](crate::RequestScope).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ContentResult, ValidationError};
use crate::filter::PublishableMode;

/// Configuration for a [`ContentEngine`](crate::ContentEngine).
///
/// # Examples
///
/// ```
/// use content_elements::ContentConfig;
///
/// let config = ContentConfig::from_json_str(r#"{"default_locales": ["de", "en"]}"#).unwrap();
/// assert_eq!(config.default_locales, vec!["de", "en"]);
/// assert_eq!(config.locale_attribute, "locale");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Locale chain used when the request carries none.
    pub default_locales: Vec<String>,

    /// Request attribute holding a comma-separated locale chain.
    pub locale_attribute: String,

    /// Request attribute holding the publication mode.
    pub publishable_attribute: String,

    /// Publication mode used when the request carries none.
    pub default_publishable: PublishableMode,

    /// Request attribute selecting whether archived variants are included.
    pub archived_attribute: String,

    /// Maximum number of nested Identity/Variant levels.
    pub max_identity_depth: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            default_locales: vec!["en".to_string()],
            locale_attribute: "locale".to_string(),
            publishable_attribute: "publishable".to_string(),
            default_publishable: PublishableMode::Published,
            archived_attribute: "archived".to_string(),
            max_identity_depth: 8,
        }
    }
}

impl ContentConfig {
    /// Parses and validates a JSON configuration. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` on malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> ContentResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> ContentResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges and attribute names.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` naming the first invalid setting.
    pub fn validate(&self) -> ContentResult<()> {
        if self.max_identity_depth == 0 {
            return Err(invalid("max_identity_depth must be at least 1"));
        }
        for (name, value) in [
            ("locale_attribute", &self.locale_attribute),
            ("publishable_attribute", &self.publishable_attribute),
            ("archived_attribute", &self.archived_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(&format!("{name} cannot be empty")));
            }
        }
        crate::dimension::LocaleChain::parse(&self.default_locales)?;
        Ok(())
    }
}

fn invalid(reason: &str) -> crate::error::ContentError {
    ValidationError::InvalidConfig {
        reason: reason.to_string(),
    }
    .into()
}
