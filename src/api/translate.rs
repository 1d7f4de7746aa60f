use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ContentResult, ValidationError};
use crate::metadata::MetadataRegistry;
use crate::record::{EntityType, RecordId};
use crate::schema::Marker;
use crate::storage::{RecordStore, StorageError};
use crate::translation::{TranslatableVariantRegistry, Translator};

/// Fields to translate and the locale to translate them into. An empty
/// `fields` list means every translatable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateFieldsInput {
    /// Field names; empty means all translatable fields.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Locale to translate into.
    pub target_locale: String,
}

/// Translated values keyed by field name. Nothing is persisted; callers apply
/// them and save through the normal update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateFieldsOutput {
    /// Translated value per field; `None` when the source field is empty.
    pub translations: BTreeMap<String, Option<String>>,
}

/// Machine-translates fields of a Variant from its own locale.
#[derive(Clone)]
pub struct TranslateFieldsProcessor {
    registry: Arc<MetadataRegistry>,
    translatable: TranslatableVariantRegistry,
    translator: Arc<dyn Translator>,
    store: Arc<dyn RecordStore>,
}

impl TranslateFieldsProcessor {
    /// Creates a processor translating through `translator`.
    #[must_use]
    pub fn new(
        registry: Arc<MetadataRegistry>,
        translator: Arc<dyn Translator>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            translatable: TranslatableVariantRegistry::new(Arc::clone(&registry)),
            registry,
            translator,
            store,
        }
    }

    /// Translates the requested fields of variant `id`.
    ///
    /// # Errors
    ///
    /// - `StorageError::RecordNotFound` if the variant does not exist
    /// - `ValidationError::MissingSourceLocale` if it has no locale value
    /// - `ValidationError::SameLocale` if the target is its own locale
    /// - `ValidationError::NoTranslatableFields` if nothing is left to translate
    /// - `ValidationError::FieldNotTranslatable` for any requested field that
    ///   is not translatable
    /// - translator failures
    pub fn process(
        &self,
        entity_type: &EntityType,
        id: &RecordId,
        input: &TranslateFieldsInput,
    ) -> ContentResult<TranslateFieldsOutput> {
        let source = self
            .store
            .get(entity_type, id)?
            .ok_or_else(|| StorageError::RecordNotFound {
                entity_type: entity_type.clone(),
                id: id.clone(),
            })?;

        let source_locale = self
            .registry
            .get_dimension_metadata(entity_type, &Marker::LOCALE)?
            .and_then(|meta| source.value(&meta.property).as_string().map(str::to_string))
            .ok_or_else(|| ValidationError::MissingSourceLocale {
                entity_type: entity_type.clone(),
                id: id.clone(),
            })?;
        let target_locale = input.target_locale.trim();
        if target_locale.is_empty() {
            return Err(ValidationError::InvalidLocaleToken {
                token: input.target_locale.clone(),
            }
            .into());
        }
        if target_locale == source_locale {
            return Err(ValidationError::SameLocale {
                locale: source_locale,
            }
            .into());
        }

        let available = self.translatable.translatable_fields(entity_type)?;
        let selected: Vec<&String> = if input.fields.is_empty() {
            available.iter().collect()
        } else {
            input.fields.iter().filter(|f| available.contains(*f)).collect()
        };
        if selected.is_empty() {
            return Err(ValidationError::NoTranslatableFields.into());
        }
        if let Some(field) = input.fields.iter().find(|f| !available.contains(*f)) {
            return Err(ValidationError::FieldNotTranslatable {
                field: field.clone(),
                available: available.to_vec(),
            }
            .into());
        }

        let texts: BTreeMap<String, Option<String>> = selected
            .into_iter()
            .map(|field| (field.clone(), source.value(field).as_string().map(str::to_string)))
            .collect();
        let translations = self
            .translator
            .translate_batch(&texts, &source_locale, target_locale)?;
        debug!(
            entity_type = %entity_type,
            id = %id,
            source = %source_locale,
            target = %target_locale,
            fields = translations.len(),
            "translated fields"
        );
        Ok(TranslateFieldsOutput { translations })
    }
}

impl std::fmt::Debug for TranslateFieldsProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslateFieldsProcessor")
            .field("translatable", &self.translatable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::schema::{PropertyDecl, Schema, TypeSchema};
    use crate::storage::InMemoryRecordStore;

    struct Bracket;

    impl Translator for Bracket {
        fn translate(&self, text: &str, _source: &str, target: &str) -> ContentResult<String> {
            Ok(format!("[{target}] {text}"))
        }
    }

    fn processor() -> TranslateFieldsProcessor {
        let schema = Schema::new().with_type(
            TypeSchema::new("ArticleVariant")
                .property(PropertyDecl::new("locale").dimension(Marker::LOCALE))
                .property(PropertyDecl::new("title").translatable())
                .property(PropertyDecl::new("body").translatable())
                .property(PropertyDecl::new("slug")),
        );
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .insert(
                Record::new("ArticleVariant", "v1")
                    .with_field("locale", "en")
                    .with_field("title", "Hello")
                    .with_field("slug", "hello"),
            )
            .unwrap();
        store.insert(Record::new("ArticleVariant", "bare")).unwrap();
        TranslateFieldsProcessor::new(
            Arc::new(MetadataRegistry::new(Arc::new(schema))),
            Arc::new(Bracket),
            store,
        )
    }

    fn input(fields: &[&str], target: &str) -> TranslateFieldsInput {
        TranslateFieldsInput {
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            target_locale: target.to_string(),
        }
    }

    fn run(id: &str, input: &TranslateFieldsInput) -> ContentResult<TranslateFieldsOutput> {
        processor().process(&EntityType::new("ArticleVariant"), &RecordId::new(id), input)
    }

    #[test]
    fn test_empty_selection_translates_all_fields() {
        let out = run("v1", &input(&[], "es")).unwrap();
        assert_eq!(out.translations.len(), 2);
        assert_eq!(out.translations["title"], Some("[es] Hello".to_string()));
        assert_eq!(out.translations["body"], None);
    }

    #[test]
    fn test_same_locale_rejected() {
        let err = run("v1", &input(&["title"], "en")).unwrap_err();
        assert!(err.to_string().contains("'en'"));
    }

    #[test]
    fn test_untranslatable_field_named() {
        let err = run("v1", &input(&["title", "slug"], "es")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Field 'slug' is not translatable. Available fields: title, body"
        );
    }

    #[test]
    fn test_only_untranslatable_fields_reports_none_valid() {
        let err = run("v1", &input(&["slug"], "es")).unwrap_err();
        assert!(matches!(
            err,
            crate::ContentError::Validation(ValidationError::NoTranslatableFields)
        ));
    }

    #[test]
    fn test_missing_locale_and_row() {
        assert!(run("bare", &input(&[], "es")).unwrap_err().is_validation());
        assert!(run("gone", &input(&[], "es")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_input_uses_camel_case() {
        let parsed: TranslateFieldsInput =
            serde_json::from_str(r#"{"targetLocale": "fr"}"#).unwrap();
        assert_eq!(parsed, input(&[], "fr"));
    }
}
