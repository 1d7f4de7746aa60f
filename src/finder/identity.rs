use std::sync::Arc;

use crate::error::ContentResult;
use crate::metadata::MetadataRegistry;
use crate::record::{EntityType, Record};
use crate::schema::IdentityDeclaration;
use crate::storage::RecordStore;
use crate::value::Value;

/// Walks from a Variant row back to its owning Identity.
#[derive(Clone)]
pub struct IdentityFinder {
    registry: Arc<MetadataRegistry>,
    store: Arc<dyn RecordStore>,
}

impl IdentityFinder {
    /// Creates a finder reading from `store`.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, store: Arc<dyn RecordStore>) -> Self {
        Self { registry, store }
    }

    /// The Identity type owning `variant_type`, with its declaration.
    ///
    /// Found through a reference property of the variant type pointing at an
    /// Identity type whose declaration names both this variant type and that
    /// property as its back-reference.
    ///
    /// # Errors
    ///
    /// Returns malformed-declaration errors from the registry.
    pub fn identity_declaration_for(
        &self,
        variant_type: &EntityType,
    ) -> ContentResult<Option<(EntityType, Arc<IdentityDeclaration>)>> {
        let Some(schema) = self.registry.type_schema(variant_type) else {
            return Ok(None);
        };
        for property in &schema.properties {
            let Some(target) = &property.references else {
                continue;
            };
            let Some(declaration) = self.registry.get_identity_declaration(target)? else {
                continue;
            };
            if &declaration.variant_type == variant_type
                && declaration.identity_property == property.name
            {
                return Ok(Some((target.clone(), declaration)));
            }
        }
        Ok(None)
    }

    /// Loads the Identity owning `variant`, or `None` if the type has no
    /// owner or the reference is unset or dangling.
    ///
    /// # Errors
    ///
    /// Returns registry and storage errors.
    pub fn find_identity(&self, variant: &Record) -> ContentResult<Option<Record>> {
        let Some((identity_type, declaration)) = self.identity_declaration_for(&variant.entity_type)? else {
            return Ok(None);
        };
        let Value::Ref(id) = variant.value(&declaration.identity_property) else {
            return Ok(None);
        };
        Ok(self.store.get(&identity_type, &id)?)
    }
}

impl std::fmt::Debug for IdentityFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityFinder").finish_non_exhaustive()
    }
}
