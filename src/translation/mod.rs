//! Translation assist.
//!
//! The translation backend is opaque and pluggable through [`Translator`];
//! which fields may be translated comes from the schema via the shared
//! [`MetadataRegistry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ContentResult;
use crate::metadata::MetadataRegistry;
use crate::record::{EntityType, Record};

/// A translation backend.
pub trait Translator: Send + Sync {
    /// Translates one text.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Translation` when the backend fails.
    fn translate(&self, text: &str, source_locale: &str, target_locale: &str) -> ContentResult<String>;

    /// Translates a batch of fields. `None` values stay `None`.
    ///
    /// # Errors
    ///
    /// Fails on the first field the backend cannot translate.
    fn translate_batch(
        &self,
        fields: &BTreeMap<String, Option<String>>,
        source_locale: &str,
        target_locale: &str,
    ) -> ContentResult<BTreeMap<String, Option<String>>> {
        fields
            .iter()
            .map(|(name, text)| {
                let translated = match text {
                    Some(text) => Some(self.translate(text, source_locale, target_locale)?),
                    None => None,
                };
                Ok((name.clone(), translated))
            })
            .collect()
    }
}

/// Translatable-field lookups over the metadata registry.
#[derive(Debug, Clone)]
pub struct TranslatableVariantRegistry {
    registry: Arc<MetadataRegistry>,
}

impl TranslatableVariantRegistry {
    /// Wraps `registry`.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self { registry }
    }

    /// Translatable properties of `entity_type`, in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn translatable_fields(&self, entity_type: &EntityType) -> ContentResult<Arc<[String]>> {
        self.registry.translatable_fields(entity_type)
    }

    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn is_translatable(&self, entity_type: &EntityType, field: &str) -> ContentResult<bool> {
        Ok(self.translatable_fields(entity_type)?.iter().any(|f| f == field))
    }

    /// Current values of every translatable field of `record`. Unset and
    /// non-string values read as `None`.
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub fn field_values(&self, record: &Record) -> ContentResult<BTreeMap<String, Option<String>>> {
        Ok(self
            .translatable_fields(&record.entity_type)?
            .iter()
            .map(|field| {
                let value = record.value(field);
                (field.clone(), value.as_string().map(str::to_string))
            })
            .collect())
    }
}
