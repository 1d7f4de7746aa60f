use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{ContentResult, ExecutionError};
use crate::finder::IdentityFinder;
use crate::metadata::{FilterMetadata, MetadataRegistry};
use crate::record::{Record, RecordId};
use crate::schema::Marker;
use crate::storage::RecordStore;
use crate::value::Value;

/// What a variant delete removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Only the variant; the identity still has `remaining` variants.
    VariantRemoved { identity: RecordId, remaining: usize },
    /// The variant was the last one, so the identity went with it.
    IdentityRemoved { identity: RecordId, variants_removed: usize },
}

/// Deletes a Variant, deleting its Identity too when it was the last one.
#[derive(Clone)]
pub struct VariantDeleteProcessor {
    registry: Arc<MetadataRegistry>,
    store: Arc<dyn RecordStore>,
    identities: IdentityFinder,
}

impl VariantDeleteProcessor {
    /// Creates a processor over `store`.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, store: Arc<dyn RecordStore>) -> Self {
        let identities = IdentityFinder::new(Arc::clone(&registry), Arc::clone(&store));
        Self {
            registry,
            store,
            identities,
        }
    }

    /// # Errors
    ///
    /// Returns `ExecutionError::IdentityNotFound` when the variant has no
    /// owning identity, `ExecutionError::MissingVariantsProperty` when the
    /// identity type does not declare its variants collection, and storage
    /// errors.
    pub fn delete(&self, variant: &Record) -> ContentResult<DeleteOutcome> {
        let identity = self
            .identities
            .find_identity(variant)?
            .ok_or_else(|| ExecutionError::IdentityNotFound {
                variant_type: variant.entity_type.clone(),
                id: variant.id.clone(),
            })?;
        let declaration = self
            .registry
            .get_identity_declaration(&identity.entity_type)?
            .ok_or_else(|| ExecutionError::MissingIdentityDeclaration {
                entity_type: identity.entity_type.clone(),
            })?;
        let declares_variants = self
            .registry
            .type_schema(&identity.entity_type)
            .and_then(|schema| schema.find_property(&declaration.variants_property))
            .is_some();
        if !declares_variants {
            return Err(ExecutionError::MissingVariantsProperty {
                identity_type: identity.entity_type.clone(),
                property: declaration.variants_property.clone(),
            }
            .into());
        }

        let owner = identity.reference();
        let count = self
            .store
            .count_by(&declaration.variant_type, &declaration.identity_property, &owner)?;

        if count <= 1 {
            let variants = self
                .store
                .find_by(&declaration.variant_type, &declaration.identity_property, &owner)?;
            for row in &variants {
                self.store.delete(&row.entity_type, &row.id)?;
            }
            self.store.delete(&identity.entity_type, &identity.id)?;
            debug!(identity_type = %identity.entity_type, identity = %identity.id, "deleted last variant and its identity");
            return Ok(DeleteOutcome::IdentityRemoved {
                identity: identity.id,
                variants_removed: variants.len(),
            });
        }

        self.store.delete(&variant.entity_type, &variant.id)?;
        debug!(variant_type = %variant.entity_type, variant = %variant.id, remaining = count - 1, "deleted variant");
        Ok(DeleteOutcome::VariantRemoved {
            identity: identity.id,
            remaining: count - 1,
        })
    }
}

impl std::fmt::Debug for VariantDeleteProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantDeleteProcessor").finish_non_exhaustive()
    }
}

/// Sets and clears the publication timestamp of a Variant.
#[derive(Clone)]
pub struct PublishableProcessor {
    registry: Arc<MetadataRegistry>,
    store: Arc<dyn RecordStore>,
}

impl PublishableProcessor {
    /// Creates a processor over `store`.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, store: Arc<dyn RecordStore>) -> Self {
        Self { registry, store }
    }

    fn publishable_property(&self, record: &Record) -> ContentResult<FilterMetadata> {
        self.registry
            .get_filter_metadata(&record.entity_type, &Marker::PUBLISHABLE)?
            .ok_or_else(|| {
                ExecutionError::MissingMarkedProperty {
                    entity_type: record.entity_type.clone(),
                    marker: Marker::PUBLISHABLE.as_str().to_string(),
                }
                .into()
            })
    }

    /// Publishes `variant` as of `at` and persists it.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::MissingMarkedProperty` if the type has no
    /// publishable property, and storage errors.
    pub fn publish(&self, variant: &mut Record, at: DateTime<Utc>) -> ContentResult<()> {
        let metadata = self.publishable_property(variant)?;
        variant.set(metadata.property, at);
        self.store.update(variant.detached())?;
        Ok(())
    }

    /// Clears the publication timestamp of `variant` and persists it.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub fn unpublish(&self, variant: &mut Record) -> ContentResult<()> {
        let metadata = self.publishable_property(variant)?;
        variant.set(metadata.property, Value::Null);
        self.store.update(variant.detached())?;
        Ok(())
    }
}

impl std::fmt::Debug for PublishableProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishableProcessor").finish_non_exhaustive()
    }
}
