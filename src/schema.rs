//! Declarative type metadata.
//!
//! A [`Schema`] is the mapping table that tells the engine which types are
//! Identities, which Variant properties act as Dimensions or Filters, and
//! which fields are translatable. It is built once at startup, either with the
//! builders below or deserialized from JSON, and only read afterwards.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ContentResult, ValidationError};
use crate::record::EntityType;

/// Marker tagging a Variant property as a particular Dimension or Filter kind.
///
/// Plugins declare the marker they handle; the metadata registry matches
/// markers against tagged properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(Cow<'static, str>);

impl Marker {
    /// Locale dimension.
    pub const LOCALE: Self = Self(Cow::Borrowed("dimension.locale"));
    /// Version dimension.
    pub const VERSION: Self = Self(Cow::Borrowed("dimension.version"));
    /// Publishable filter.
    pub const PUBLISHABLE: Self = Self(Cow::Borrowed("filter.publishable"));
    /// Archivable filter.
    pub const ARCHIVABLE: Self = Self(Cow::Borrowed("filter.archivable"));

    /// Creates a custom marker.
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the marker name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_variants_property() -> String {
    "variants".to_string()
}

fn default_identity_property() -> String {
    "identity".to_string()
}

fn default_variant_property() -> String {
    "variant".to_string()
}

/// Marks an entity type as an Identity owning Variant rows.
///
/// Composable: a Variant type may itself declare an identity, giving chains
/// such as `ContentIdentity -> ContentVersion -> ContentLocalised`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDeclaration {
    /// Type holding the variant rows.
    pub variant_type: EntityType,

    /// Collection property on the identity holding its variants.
    #[serde(default = "default_variants_property")]
    pub variants_property: String,

    /// Back-reference property on the variant type pointing at the identity.
    #[serde(default = "default_identity_property")]
    pub identity_property: String,

    /// Slot on the identity where the resolved variant is attached.
    #[serde(default = "default_variant_property")]
    pub variant_property: String,
}

impl IdentityDeclaration {
    /// Declaration with the default property names.
    #[must_use]
    pub fn new(variant_type: impl Into<EntityType>) -> Self {
        Self {
            variant_type: variant_type.into(),
            variants_property: default_variants_property(),
            identity_property: default_identity_property(),
            variant_property: default_variant_property(),
        }
    }

    /// Renames the identity's variants collection.
    #[must_use]
    pub fn variants_property(mut self, name: impl Into<String>) -> Self {
        self.variants_property = name.into();
        self
    }

    /// Renames the variant's back-reference to its identity.
    #[must_use]
    pub fn identity_property(mut self, name: impl Into<String>) -> Self {
        self.identity_property = name.into();
        self
    }

    /// Renames the identity's hydrated-variant slot.
    #[must_use]
    pub fn variant_property(mut self, name: impl Into<String>) -> Self {
        self.variant_property = name.into();
        self
    }
}

/// Declaration of one property on an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    /// Property name.
    pub name: String,

    /// Dimension marker, if the property is a dimension axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Marker>,

    /// Filter marker, if the property narrows results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Marker>,

    /// Whether the property holds translatable text.
    #[serde(default)]
    pub translatable: bool,

    /// Target type for to-one references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<EntityType>,

    /// Whether the property is a to-many collection.
    #[serde(default)]
    pub collection: bool,
}

impl PropertyDecl {
    /// Plain property.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: None,
            filter: None,
            translatable: false,
            references: None,
            collection: false,
        }
    }

    /// Tags the property as a dimension.
    #[must_use]
    pub fn dimension(mut self, marker: Marker) -> Self {
        self.dimension = Some(marker);
        self
    }

    /// Tags the property as a filter.
    #[must_use]
    pub fn filter(mut self, marker: Marker) -> Self {
        self.filter = Some(marker);
        self
    }

    /// Marks the property as machine-translatable.
    #[must_use]
    pub fn translatable(mut self) -> Self {
        self.translatable = true;
        self
    }

    /// Declares the property as a reference to `target`.
    #[must_use]
    pub fn references(mut self, target: impl Into<EntityType>) -> Self {
        self.references = Some(target.into());
        self
    }

    /// Declares the property as a to-many reference.
    #[must_use]
    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }
}

/// Declared shape of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Type name.
    pub entity_type: EntityType,

    /// Identity declaration, when the type owns variants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityDeclaration>,

    /// Declared properties, in declaration order.
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
}

impl TypeSchema {
    /// Type with no properties and no identity declaration.
    #[must_use]
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            identity: None,
            properties: Vec::new(),
        }
    }

    /// Declares the type an identity.
    #[must_use]
    pub fn identity(mut self, declaration: IdentityDeclaration) -> Self {
        self.identity = Some(declaration);
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    /// Looks up a declared property.
    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// The full mapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TypeSchema>", into = "Vec<TypeSchema>")]
pub struct Schema {
    types: HashMap<EntityType, TypeSchema>,
}

impl Schema {
    /// Empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a type declaration.
    #[must_use]
    pub fn with_type(mut self, schema: TypeSchema) -> Self {
        self.types.insert(schema.entity_type.clone(), schema);
        self
    }

    /// Returns the declaration of a type.
    #[must_use]
    pub fn get(&self, entity_type: &EntityType) -> Option<&TypeSchema> {
        self.types.get(entity_type)
    }

    /// Number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when no type is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parses a schema from its JSON form (a list of type declarations).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if the JSON does not describe a schema.
    pub fn from_json_str(json: &str) -> ContentResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ValidationError::InvalidConfig {
                reason: format!("invalid schema: {e}"),
            }
            .into()
        })
    }
}

impl From<Vec<TypeSchema>> for Schema {
    fn from(types: Vec<TypeSchema>) -> Self {
        types.into_iter().fold(Self::new(), Self::with_type)
    }
}

impl From<Schema> for Vec<TypeSchema> {
    fn from(schema: Schema) -> Self {
        let mut types: Vec<TypeSchema> = schema.types.into_values().collect();
        types.sort_by(|a, b| a.entity_type.cmp(&b.entity_type));
        types
    }
}
