//! Records: the stored rows of Identity and Variant types.
//!
//! A [`Record`] is one row of a declared [`EntityType`]. Identity rows own
//! Variant rows through a back-reference field holding [`Value::Ref`]. The
//! resolved variant is attached to its identity at read time and never
//! persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Stable identifier of a stored row.
///
/// # Examples
///
/// ```
/// use content_elements::RecordId;
///
/// let id = RecordId::generate("article");
/// assert!(id.as_str().starts_with("article-"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a random record ID with the given prefix (e.g. `article-1f2e3d4c`).
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}", &uuid[..8]))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Name of a declared entity type (e.g. `Article`, `ArticleVariant`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Creates an entity type name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the type name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("entity type cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of an entity type.
///
/// # Examples
///
/// ```
/// use content_elements::{Record, Value};
///
/// let article = Record::new("Article", "article-1").with_field("slug", "hello");
/// let variant = Record::new("ArticleVariant", "variant-1")
///     .with_field("identity", article.reference())
///     .with_field("locale", "en");
///
/// assert_eq!(variant.value("locale"), Value::from("en"));
/// assert_eq!(variant.value("identity"), Value::Ref(article.id.clone()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Row identifier, unique within its type.
    pub id: RecordId,

    /// Declared type of the row.
    pub entity_type: EntityType,

    /// Stored field values.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// Read-time projections (e.g. the resolved variant), keyed by slot name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attached: BTreeMap<String, Record>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new(entity_type: impl Into<EntityType>, id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            fields: BTreeMap::new(),
            attached: BTreeMap::new(),
        }
    }

    /// Sets a field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value. `id` resolves to a reference to this row;
    /// missing fields read as `Null`.
    #[must_use]
    pub fn value(&self, property: &str) -> Value {
        if property == "id" {
            return self.reference();
        }
        self.fields.get(property).cloned().unwrap_or(Value::Null)
    }

    /// Returns a reference value pointing at this row.
    #[must_use]
    pub fn reference(&self) -> Value {
        Value::Ref(self.id.clone())
    }

    /// Attaches a read-time projection under `slot`.
    pub fn attach(&mut self, slot: impl Into<String>, record: Record) {
        self.attached.insert(slot.into(), record);
    }

    /// Returns the projection attached under `slot`.
    #[must_use]
    pub fn attached(&self, slot: &str) -> Option<&Record> {
        self.attached.get(slot)
    }

    /// Returns a copy without read-time projections (what a store persists).
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            id: self.id.clone(),
            entity_type: self.entity_type.clone(),
            fields: self.fields.clone(),
            attached: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_generate_is_prefixed_and_unique() {
        let a = RecordId::generate("article");
        let b = RecordId::generate("article");
        assert!(a.as_str().starts_with("article-"));
        assert_eq!(a.as_str().len(), "article-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_entity_type_rejects_empty() {
        assert!(EntityType::try_from("  ".to_string()).is_err());
        assert_eq!(
            EntityType::try_from(" Article ".to_string()).unwrap(),
            EntityType::new("Article")
        );
    }

    #[test]
    fn test_record_id_from_owned_string() {
        let record = Record::new("Article", format!("article-{}", 7));
        assert_eq!(record.id, RecordId::new("article-7"));
    }

    #[test]
    fn test_missing_field_reads_null() {
        let record = Record::new("Article", "a");
        assert_eq!(record.value("slug"), Value::Null);
        assert_eq!(record.value("id"), Value::Ref(RecordId::new("a")));
    }

    #[test]
    fn test_attach_and_detach() {
        let mut article = Record::new("Article", "a");
        article.attach("variant", Record::new("ArticleVariant", "v"));
        assert_eq!(article.attached("variant").map(|v| v.id.as_str()), Some("v"));

        let stored = article.detached();
        assert!(stored.attached("variant").is_none());
        assert_eq!(stored.id, article.id);
    }

    #[test]
    fn test_record_serialization_skips_empty_attachments() {
        let record = Record::new("Article", "a").with_field("slug", "x");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("attached"));
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
