//! Soft-archive filter.

use crate::config::ContentConfig;
use crate::context::{RequestScope, ResolvedValue};
use crate::error::{ContentResult, ValidationError};
use crate::finder::IdentityConstraint;
use crate::metadata::FilterMetadata;
use crate::query::{Expr, Query};
use crate::schema::Marker;

use super::Filter;

/// Hides archived variants.
///
/// The tagged property holds the archive timestamp; a variant is active while
/// it is null. Resolves to `Flag(true)` (hide archived) unless the request
/// attribute asks to `include` them.
#[derive(Debug, Clone)]
pub struct Archivable {
    marker: Marker,
    attribute: String,
}

impl Archivable {
    /// Registry key of the filter.
    pub const KEY: &'static str = "archivable";

    /// Reads the mode from `attribute`; archived variants are hidden by default.
    #[must_use]
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            marker: Marker::ARCHIVABLE,
            attribute: attribute.into(),
        }
    }

    /// Builds the filter from the configured attribute.
    #[must_use]
    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(config.archived_attribute.clone())
    }

    fn active_only(value: &ResolvedValue) -> bool {
        matches!(value, ResolvedValue::Flag(true))
    }
}

impl Filter for Archivable {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn marker(&self) -> &Marker {
        &self.marker
    }

    fn resolve_value(&self, scope: &RequestScope) -> ContentResult<ResolvedValue> {
        match scope.attribute(&self.attribute).map(str::trim) {
            None | Some("exclude") => Ok(ResolvedValue::Flag(true)),
            Some("include") => Ok(ResolvedValue::Flag(false)),
            Some(other) => Err(ValidationError::InvalidConfig {
                reason: format!("'{}' must be 'include' or 'exclude', got '{other}'", self.attribute),
            }
            .into()),
        }
    }

    fn apply_to_identity_query(
        &self,
        constraint: &mut IdentityConstraint<'_>,
        metadata: &FilterMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool> {
        if !Self::active_only(value) {
            return Ok(false);
        }
        let field = constraint.variant_field(&metadata.property);
        constraint.and_shared(Expr::IsNull(field));
        Ok(true)
    }

    fn apply_to_variant_query(
        &self,
        query: &mut Query,
        metadata: &FilterMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<()> {
        if Self::active_only(value) {
            let field = query.field(&metadata.property);
            query.and_where(Expr::IsNull(field));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::query::Operand;
    use crate::schema::IdentityDeclaration;

    fn meta() -> FilterMetadata {
        FilterMetadata {
            property: "archivedAt".to_string(),
            marker: Marker::ARCHIVABLE,
        }
    }

    #[test]
    fn test_resolve_defaults_to_hiding_archived() {
        let filter = Archivable::new("archived");
        assert_eq!(
            filter.resolve_value(&RequestScope::new()).unwrap(),
            ResolvedValue::Flag(true)
        );
        let include = RequestScope::new().with_attribute("archived", "include");
        assert_eq!(filter.resolve_value(&include).unwrap(), ResolvedValue::Flag(false));
        let bad = RequestScope::new().with_attribute("archived", "sometimes");
        assert!(filter.resolve_value(&bad).is_err());
    }

    #[test]
    fn test_identity_contribution() {
        let filter = Archivable::new("archived");
        let mut query = Query::select("Article", "i");
        let mut constraint = IdentityConstraint::new(
            &mut query,
            Arc::new(IdentityDeclaration::new("ArticleVariant")),
            "i",
            "variant_0",
        );
        assert!(!filter
            .apply_to_identity_query(&mut constraint, &meta(), &ResolvedValue::Flag(false))
            .unwrap());
        assert!(filter
            .apply_to_identity_query(&mut constraint, &meta(), &ResolvedValue::Flag(true))
            .unwrap());
        let (shared, _) = constraint.into_parts();
        assert_eq!(shared, vec![Expr::IsNull(Operand::field("variant_0", "archivedAt"))]);
    }

    #[test]
    fn test_variant_query() {
        let filter = Archivable::new("archived");
        let mut query = Query::select("ArticleVariant", "v");
        filter
            .apply_to_variant_query(&mut query, &meta(), &ResolvedValue::Flag(true))
            .unwrap();
        assert_eq!(query.to_string(), "SELECT v FROM ArticleVariant v WHERE v.archivedAt IS NULL");
    }
}
