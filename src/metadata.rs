//! Process-wide metadata registry.
//!
//! Answers "is this type an Identity?" and "which Variant properties are
//! Dimensions or Filters?" from the declarative [`Schema`]. Every answer is a
//! pure function of the schema, so lookups are memoized per type for the
//! lifetime of the registry and shared freely across request threads.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::error::{ContentResult, ValidationError};
use crate::record::EntityType;
use crate::schema::{IdentityDeclaration, Marker, Schema, TypeSchema};

/// A Variant property acting as a Dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionMetadata {
    /// Property name on the Variant type.
    pub property: String,
    /// Dimension marker the property carries.
    pub marker: Marker,
}

/// A Variant property acting as a Filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMetadata {
    /// Property name on the Variant type.
    pub property: String,
    /// Filter marker the property carries.
    pub marker: Marker,
}

/// One tagged property of a Variant type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantMetadataItem {
    /// Property tagged with a dimension marker.
    Dimension(DimensionMetadata),
    /// Property tagged with a filter marker.
    Filter(FilterMetadata),
}

/// Compute-once-if-absent map.
///
/// A lock poisoned by a panicking reader still holds consistent data (entries
/// are inserted whole), so poisoning is ignored.
#[derive(Debug)]
struct Memo<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug, V: Clone> Memo<K, V> {
    fn get_or_try_insert(
        &self,
        key: &K,
        compute: impl FnOnce() -> ContentResult<V>,
    ) -> ContentResult<V> {
        {
            let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = guard.get(key) {
                return Ok(value.clone());
            }
        }

        let computed = compute()?;
        trace!(key = ?key, "metadata cache fill");

        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have filled it meanwhile; keep the first value.
        Ok(guard.entry(key.clone()).or_insert(computed).clone())
    }
}

/// Cached metadata lookups over a [`Schema`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use content_elements::schema::{IdentityDeclaration, Marker, PropertyDecl, Schema, TypeSchema};
/// use content_elements::{EntityType, MetadataRegistry};
///
/// let schema = Schema::new()
///     .with_type(TypeSchema::new("Article").identity(IdentityDeclaration::new("ArticleVariant")))
///     .with_type(
///         TypeSchema::new("ArticleVariant")
///             .property(PropertyDecl::new("identity").references("Article"))
///             .property(PropertyDecl::new("locale").dimension(Marker::LOCALE)),
///     );
/// let registry = MetadataRegistry::new(Arc::new(schema));
///
/// let decl = registry.get_identity_declaration(&EntityType::new("Article")).unwrap().unwrap();
/// assert_eq!(decl.variant_type, EntityType::new("ArticleVariant"));
///
/// let locale = registry
///     .get_dimension_metadata(&decl.variant_type, &Marker::LOCALE)
///     .unwrap()
///     .unwrap();
/// assert_eq!(locale.property, "locale");
/// ```
#[derive(Debug)]
pub struct MetadataRegistry {
    schema: Arc<Schema>,
    identities: Memo<EntityType, Option<Arc<IdentityDeclaration>>>,
    variants: Memo<EntityType, Arc<[VariantMetadataItem]>>,
    translatable: Memo<EntityType, Arc<[String]>>,
}

impl MetadataRegistry {
    /// Creates a registry over `schema` with empty caches.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            identities: Memo::default(),
            variants: Memo::default(),
            translatable: Memo::default(),
        }
    }

    /// The schema this registry reads.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Declared shape of a type, if any.
    #[must_use]
    pub fn type_schema(&self, entity_type: &EntityType) -> Option<&TypeSchema> {
        self.schema.get(entity_type)
    }

    /// Returns the identity declaration of `entity_type`, or `None` if the type
    /// does not participate in the Identity/Variant model.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MalformedIdentityDeclaration` when the declared
    /// variant type is unknown or lacks the back-reference property.
    pub fn get_identity_declaration(
        &self,
        entity_type: &EntityType,
    ) -> ContentResult<Option<Arc<IdentityDeclaration>>> {
        self.identities.get_or_try_insert(entity_type, || {
            let Some(declaration) = self.schema.get(entity_type).and_then(|t| t.identity.as_ref())
            else {
                return Ok(None);
            };
            let malformed = |reason: String| ValidationError::MalformedIdentityDeclaration {
                identity_type: entity_type.clone(),
                reason,
            };
            let variant = self
                .schema
                .get(&declaration.variant_type)
                .ok_or_else(|| malformed(format!("unknown variant type {}", declaration.variant_type)))?;
            if variant.find_property(&declaration.identity_property).is_none() {
                return Err(malformed(format!(
                    "{} has no '{}' back-reference property",
                    declaration.variant_type, declaration.identity_property
                ))
                .into());
            }
            Ok(Some(Arc::new(declaration.clone())))
        })
    }

    /// All Dimension and Filter tagged properties of a Variant type, in
    /// declaration order. Unknown types have none.
    ///
    /// # Errors
    ///
    /// Only fails if cache population fails, which plain schema reads do not.
    pub fn get_variant_metadata(
        &self,
        variant_type: &EntityType,
    ) -> ContentResult<Arc<[VariantMetadataItem]>> {
        self.variants.get_or_try_insert(variant_type, || {
            let Some(schema) = self.schema.get(variant_type) else {
                return Ok(Arc::from(Vec::new()));
            };
            let mut items = Vec::new();
            for property in &schema.properties {
                if let Some(marker) = &property.dimension {
                    items.push(VariantMetadataItem::Dimension(DimensionMetadata {
                        property: property.name.clone(),
                        marker: marker.clone(),
                    }));
                }
                if let Some(marker) = &property.filter {
                    items.push(VariantMetadataItem::Filter(FilterMetadata {
                        property: property.name.clone(),
                        marker: marker.clone(),
                    }));
                }
            }
            Ok(Arc::from(items))
        })
    }

    /// The property tagged with a Dimension `marker`, if any.
    ///
    /// # Errors
    ///
    /// See [`Self::get_variant_metadata`].
    pub fn get_dimension_metadata(
        &self,
        variant_type: &EntityType,
        marker: &Marker,
    ) -> ContentResult<Option<DimensionMetadata>> {
        Ok(self
            .get_variant_metadata(variant_type)?
            .iter()
            .find_map(|item| match item {
                VariantMetadataItem::Dimension(meta) if &meta.marker == marker => Some(meta.clone()),
                _ => None,
            }))
    }

    /// The property tagged with a Filter `marker`, if any.
    ///
    /// # Errors
    ///
    /// See [`Self::get_variant_metadata`].
    pub fn get_filter_metadata(
        &self,
        variant_type: &EntityType,
        marker: &Marker,
    ) -> ContentResult<Option<FilterMetadata>> {
        Ok(self
            .get_variant_metadata(variant_type)?
            .iter()
            .find_map(|item| match item {
                VariantMetadataItem::Filter(meta) if &meta.marker == marker => Some(meta.clone()),
                _ => None,
            }))
    }

    /// Names of the translatable properties of a type, in declaration order.
    ///
    /// # Errors
    ///
    /// See [`Self::get_variant_metadata`].
    pub fn translatable_fields(&self, entity_type: &EntityType) -> ContentResult<Arc<[String]>> {
        self.translatable.get_or_try_insert(entity_type, || {
            Ok(self
                .schema
                .get(entity_type)
                .map(|t| {
                    t.properties
                        .iter()
                        .filter(|p| p.translatable)
                        .map(|p| p.name.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
                .into())
        })
    }
}
