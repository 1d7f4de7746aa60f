//! Publication-window filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ContentConfig;
use crate::context::{RequestScope, ResolvedValue};
use crate::error::{ContentResult, ValidationError};
use crate::finder::IdentityConstraint;
use crate::metadata::FilterMetadata;
use crate::query::{Expr, Operand, Query};
use crate::schema::Marker;
use crate::value::Value;

use super::Filter;

/// Which publication states are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishableMode {
    /// No constraint.
    Any,
    /// Publication timestamp set and not in the future.
    #[default]
    Published,
    /// Publication timestamp set, at any time.
    PublishedOrScheduled,
}

impl PublishableMode {
    /// Parses a request attribute value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "all" | "false" => Some(Self::Any),
            "published" | "true" => Some(Self::Published),
            "published_or_scheduled" | "scheduled" => Some(Self::PublishedOrScheduled),
            _ => None,
        }
    }
}

/// Resolved publication filter, evaluated as of a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishableResolvedValue {
    /// Visible publication states.
    pub mode: PublishableMode,
    /// Instant that `Published` compares against.
    pub as_of: DateTime<Utc>,
}

impl PublishableResolvedValue {
    /// Creates a filter value for `mode` evaluated at `as_of`.
    #[must_use]
    pub const fn new(mode: PublishableMode, as_of: DateTime<Utc>) -> Self {
        Self { mode, as_of }
    }

    /// Interprets any resolved value as a publication filter.
    ///
    /// `Flag(false)` and `Unrestricted` mean any state. A bare `Flag(true)`
    /// carries no instant to compare against and is rejected; resolve the
    /// filter through a [`RequestScope`] instead. Other shapes are not
    /// publication filters.
    pub fn from_resolved(value: &ResolvedValue) -> ContentResult<Option<Self>> {
        match value {
            ResolvedValue::Publishable(v) => Ok(Some(*v)),
            ResolvedValue::Flag(false) | ResolvedValue::Unrestricted => {
                Ok(Some(Self::new(PublishableMode::Any, DateTime::<Utc>::MIN_UTC)))
            }
            ResolvedValue::Flag(true) => Err(ValidationError::InvalidConfig {
                reason: "publishable filter needs a resolved instant, got a bare flag".to_string(),
            }
            .into()),
            ResolvedValue::Chain(_) | ResolvedValue::Custom(_) => Ok(None),
        }
    }

    fn predicates(&self, field: &Operand, now: impl FnOnce(Value) -> Operand) -> Vec<Expr> {
        match self.mode {
            PublishableMode::Any => Vec::new(),
            PublishableMode::Published => vec![
                Expr::IsNotNull(field.clone()),
                Expr::le(field.clone(), now(Value::Timestamp(self.as_of))),
            ],
            PublishableMode::PublishedOrScheduled => vec![Expr::IsNotNull(field.clone())],
        }
    }
}

/// Filters variants by their publication timestamp.
#[derive(Debug, Clone)]
pub struct Publishable {
    marker: Marker,
    attribute: String,
    default_mode: PublishableMode,
}

impl Publishable {
    /// Registry key of the filter.
    pub const KEY: &'static str = "publishable";

    /// Reads the mode from `attribute`, falling back to `default_mode`.
    #[must_use]
    pub fn new(attribute: impl Into<String>, default_mode: PublishableMode) -> Self {
        Self {
            marker: Marker::PUBLISHABLE,
            attribute: attribute.into(),
            default_mode,
        }
    }

    /// Builds the filter from the configured attribute and default mode.
    #[must_use]
    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(config.publishable_attribute.clone(), config.default_publishable)
    }
}

impl Filter for Publishable {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn marker(&self) -> &Marker {
        &self.marker
    }

    fn resolve_value(&self, scope: &RequestScope) -> ContentResult<ResolvedValue> {
        let mode = match scope.attribute(&self.attribute) {
            None => self.default_mode,
            Some(raw) => PublishableMode::parse(raw).ok_or_else(|| ValidationError::InvalidConfig {
                reason: format!("unknown publishable mode '{raw}'"),
            })?,
        };
        Ok(ResolvedValue::Publishable(PublishableResolvedValue::new(mode, scope.now())))
    }

    fn apply_to_identity_query(
        &self,
        constraint: &mut IdentityConstraint<'_>,
        metadata: &FilterMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool> {
        let Some(value) = PublishableResolvedValue::from_resolved(value)? else {
            return Ok(false);
        };
        let field = constraint.variant_field(&metadata.property);
        let predicates = value.predicates(&field, |now| constraint.parameter("now", now));
        let contributed = !predicates.is_empty();
        for predicate in predicates {
            constraint.and_shared(predicate);
        }
        Ok(contributed)
    }

    fn apply_to_variant_query(
        &self,
        query: &mut Query,
        metadata: &FilterMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<()> {
        let Some(value) = PublishableResolvedValue::from_resolved(value)? else {
            return Ok(());
        };
        let field = query.field(&metadata.property);
        for predicate in value.predicates(&field, |now| query.parameter("now", now)) {
            query.and_where(predicate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::schema::IdentityDeclaration;

    fn meta() -> FilterMetadata {
        FilterMetadata {
            property: "publishAt".to_string(),
            marker: Marker::PUBLISHABLE,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(PublishableMode::parse("Any"), Some(PublishableMode::Any));
        assert_eq!(PublishableMode::parse("true"), Some(PublishableMode::Published));
        assert_eq!(
            PublishableMode::parse("published_or_scheduled"),
            Some(PublishableMode::PublishedOrScheduled)
        );
        assert_eq!(PublishableMode::parse("maybe"), None);
    }

    #[test]
    fn test_resolve_captures_scope_instant() {
        let filter = Publishable::new("publishable", PublishableMode::Published);
        let value = filter.resolve_value(&RequestScope::at(noon())).unwrap();
        assert_eq!(
            value,
            ResolvedValue::Publishable(PublishableResolvedValue::new(PublishableMode::Published, noon()))
        );

        let admin = RequestScope::at(noon()).with_attribute("publishable", "any");
        assert!(matches!(
            filter.resolve_value(&admin).unwrap(),
            ResolvedValue::Publishable(PublishableResolvedValue { mode: PublishableMode::Any, .. })
        ));

        let bad = RequestScope::at(noon()).with_attribute("publishable", "soon");
        assert!(filter.resolve_value(&bad).unwrap_err().is_validation());
    }

    #[test]
    fn test_published_variant_query() {
        let filter = Publishable::new("publishable", PublishableMode::Published);
        let mut query = Query::select("ArticleVariant", "v");
        let value = ResolvedValue::Publishable(PublishableResolvedValue::new(PublishableMode::Published, noon()));
        filter.apply_to_variant_query(&mut query, &meta(), &value).unwrap();

        assert_eq!(
            query.to_string(),
            "SELECT v FROM ArticleVariant v WHERE v.publishAt IS NOT NULL AND v.publishAt <= :now_0"
        );
        assert_eq!(query.params.get("now_0"), Some(&Value::Timestamp(noon())));
    }

    #[test]
    fn test_any_contributes_nothing() {
        let filter = Publishable::new("publishable", PublishableMode::Published);
        let mut query = Query::select("Article", "i");
        let mut constraint = IdentityConstraint::new(
            &mut query,
            Arc::new(IdentityDeclaration::new("ArticleVariant")),
            "i",
            "variant_0",
        );
        let value = ResolvedValue::Publishable(PublishableResolvedValue::new(PublishableMode::Any, noon()));
        assert!(!filter.apply_to_identity_query(&mut constraint, &meta(), &value).unwrap());
        assert!(!filter
            .apply_to_identity_query(&mut constraint, &meta(), &ResolvedValue::Flag(false))
            .unwrap());
        let (shared, identity) = constraint.into_parts();
        assert!(shared.is_empty() && identity.is_empty());
    }

    #[test]
    fn test_bare_true_flag_is_rejected() {
        let filter = Publishable::new("publishable", PublishableMode::Published);
        let mut query = Query::select("ArticleVariant", "v");
        let err = filter
            .apply_to_variant_query(&mut query, &meta(), &ResolvedValue::Flag(true))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(query.conditions.is_empty());
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_scheduled_only_requires_timestamp() {
        let filter = Publishable::new("publishable", PublishableMode::Published);
        let mut query = Query::select("Article", "i");
        let mut constraint = IdentityConstraint::new(
            &mut query,
            Arc::new(IdentityDeclaration::new("ArticleVariant")),
            "i",
            "variant_0",
        );
        let value = ResolvedValue::Publishable(PublishableResolvedValue::new(
            PublishableMode::PublishedOrScheduled,
            noon(),
        ));
        assert!(filter.apply_to_identity_query(&mut constraint, &meta(), &value).unwrap());
        let (shared, _) = constraint.into_parts();
        assert_eq!(shared, vec![Expr::IsNotNull(Operand::field("variant_0", "publishAt"))]);
    }
}
