//! Error types for content-elements.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Validation errors are caller or configuration
//! mistakes and never change on retry; execution errors come from running
//! queries against a store.

use thiserror::Error;

use crate::record::{EntityType, RecordId};
use crate::storage::StorageError;

/// Validation errors raised before any query runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A locale token is empty or not a locale code.
    #[error("Invalid locale token '{token}'")]
    InvalidLocaleToken {
        /// Offending token.
        token: String,
    },

    /// A chain combines positives with negatives of other locales.
    #[error(
        "Locale chain {chain:?} mixes positive and negative entries that are not equivalents; \
         a negative locale can only be combined with its own positive (e.g. \"en,!en\")"
    )]
    MixedLocaleChain {
        /// Chain as written.
        chain: Vec<String>,
    },

    /// An identity declaration is missing required parts.
    #[error("Identity declaration on {identity_type} is malformed: {reason}")]
    MalformedIdentityDeclaration {
        /// Identity type involved.
        identity_type: EntityType,
        /// What is wrong.
        reason: String,
    },

    /// An order selector registered without a dimension key.
    #[error("Variant order selector '{selector}' must declare the dimension key it orders by")]
    MissingSelectorKey {
        /// Selector name.
        selector: String,
    },

    /// Two plugins share a key.
    #[error("Plugin key '{key}' is registered more than once")]
    DuplicatePluginKey {
        /// Duplicated key.
        key: String,
    },

    /// A configuration or request attribute value is not usable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// Translation source and target locale are equal.
    #[error("Cannot translate: source and target locales are both '{locale}'")]
    SameLocale {
        /// The shared locale.
        locale: String,
    },

    /// A requested field is not marked translatable.
    #[error("Field '{field}' is not translatable. Available fields: {}", available.join(", "))]
    FieldNotTranslatable {
        /// Requested field.
        field: String,
        /// Fields that can be translated.
        available: Vec<String>,
    },

    /// The request named no translatable field.
    #[error("No valid translatable fields specified")]
    NoTranslatableFields,

    /// The source variant has no locale value.
    #[error("{entity_type} {id} has no locale dimension value")]
    MissingSourceLocale {
        /// Type involved.
        entity_type: EntityType,
        /// Record involved.
        id: RecordId,
    },
}

/// Execution errors that occur while resolving or mutating content.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// No variant of the identity matched the context.
    #[error("{identity_type} {id} found no variant")]
    VariantNotFound {
        /// Identity type involved.
        identity_type: EntityType,
        /// Record involved.
        id: RecordId,
    },

    /// The variant points at no identity.
    #[error("No identity found for {variant_type} {id}")]
    IdentityNotFound {
        /// Variant type involved.
        variant_type: EntityType,
        /// Record involved.
        id: RecordId,
    },

    /// The type is not an identity type.
    #[error("{entity_type} does not declare an identity")]
    MissingIdentityDeclaration {
        /// Type involved.
        entity_type: EntityType,
    },

    /// The identity has no variants collection.
    #[error("{identity_type} does not declare a '{property}' variants property")]
    MissingVariantsProperty {
        /// Identity type involved.
        identity_type: EntityType,
        /// Expected property name.
        property: String,
    },

    /// No property carries the requested marker.
    #[error("{entity_type} has no property tagged with marker '{marker}'")]
    MissingMarkedProperty {
        /// Type involved.
        entity_type: EntityType,
        /// Marker looked up.
        marker: String,
    },

    /// Nested identities exceed the configured depth.
    #[error("Identity chain starting at {entity_type} exceeds depth {max_depth}")]
    IdentityChainTooDeep {
        /// Type involved.
        entity_type: EntityType,
        /// Configured depth limit.
        max_depth: usize,
    },

    /// The record store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The translator failed.
    #[error("Translation failed: {message}")]
    Translation {
        /// Failure message.
        message: String,
    },
}

/// Top-level error type for content-elements.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Input or configuration was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Running a lookup or mutation failed.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure message.
        message: String,
    },
}

impl ContentError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the error reports a missing variant, identity or row.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(
                e,
                ExecutionError::VariantNotFound { .. }
                    | ExecutionError::IdentityNotFound { .. }
                    | ExecutionError::Storage(StorageError::RecordNotFound { .. })
            ),
            _ => false,
        }
    }
}

impl From<StorageError> for ContentError {
    fn from(err: StorageError) -> Self {
        Self::Execution(ExecutionError::Storage(err))
    }
}

/// Result type alias for content-elements operations.
pub type ContentResult<T> = Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_locale_chain_names_combination() {
        let err = ValidationError::MixedLocaleChain {
            chain: vec!["en".to_string(), "!de".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"en\""));
        assert!(msg.contains("\"!de\""));
        assert!(msg.contains("en,!en"));
    }

    #[test]
    fn test_variant_not_found_carries_type_and_id() {
        let err = ExecutionError::VariantNotFound {
            identity_type: EntityType::new("Article"),
            id: RecordId::new("article-1"),
        };
        assert_eq!(err.to_string(), "Article article-1 found no variant");
    }

    #[test]
    fn test_field_not_translatable_lists_available() {
        let err = ValidationError::FieldNotTranslatable {
            field: "slug".to_string(),
            available: vec!["title".to_string(), "body".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'slug'"));
        assert!(msg.contains("title, body"));
    }

    #[test]
    fn test_content_error_from_validation() {
        let err: ContentError = ValidationError::NoTranslatableFields.into();
        assert!(err.is_validation());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_content_error_not_found() {
        let err: ContentError = ExecutionError::VariantNotFound {
            identity_type: EntityType::new("Article"),
            id: RecordId::new("a"),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_not_found());

        let err: ContentError = StorageError::RecordNotFound {
            entity_type: EntityType::new("Article"),
            id: RecordId::new("a"),
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_content_error_internal() {
        let err = ContentError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(err.to_string().contains("unexpected state"));
    }
}
