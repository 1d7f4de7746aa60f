//! Version dimension: ordering only.

use crate::context::{RequestScope, ResolvedValue};
use crate::error::ContentResult;
use crate::finder::IdentityConstraint;
use crate::metadata::DimensionMetadata;
use crate::order::{OrderJoin, VariantOrderSelector};
use crate::query::{CmpOp, Direction, Expr, Query, SortExpr};
use crate::schema::Marker;

use super::Dimension;

/// Prefers the highest version. Has no existence semantics: any version
/// satisfies an Identity query.
#[derive(Debug, Clone)]
pub struct Version {
    marker: Marker,
}

impl Version {
    /// Registry key of the dimension.
    pub const KEY: &'static str = "version";

    /// Creates the dimension.
    #[must_use]
    pub fn new() -> Self {
        Self {
            marker: Marker::VERSION,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new()
    }
}

impl Dimension for Version {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn marker(&self) -> &Marker {
        &self.marker
    }

    fn resolve_value(&self, _scope: &RequestScope) -> ContentResult<ResolvedValue> {
        Ok(ResolvedValue::Unrestricted)
    }

    fn apply_to_identity_query(
        &self,
        _constraint: &mut IdentityConstraint<'_>,
        _metadata: &DimensionMetadata,
        _value: &ResolvedValue,
    ) -> ContentResult<bool> {
        Ok(false)
    }

    fn apply_to_variant_query(
        &self,
        query: &mut Query,
        metadata: &DimensionMetadata,
        _value: &ResolvedValue,
    ) -> ContentResult<()> {
        let field = query.field(&metadata.property);
        query.add_order_by(SortExpr::Operand(field), Direction::Desc);
        Ok(())
    }
}

impl VariantOrderSelector for Version {
    fn name(&self) -> &str {
        "version"
    }

    fn dimension_key(&self) -> Option<&str> {
        Some(Self::KEY)
    }

    /// Highest version first; rows without a version rank last.
    fn constrain_order_join(
        &self,
        join: &mut OrderJoin<'_>,
        metadata: &DimensionMetadata,
        _value: &ResolvedValue,
    ) -> ContentResult<bool> {
        let candidate = join.candidate_field(&metadata.property);
        let rival = join.rival_field(&metadata.property);
        let beats = Expr::any(vec![
            Expr::compare(rival.clone(), CmpOp::Gt, candidate.clone()),
            Expr::all(vec![Expr::IsNotNull(rival.clone()), Expr::IsNull(candidate.clone())]),
        ]);
        let ties = Expr::any(vec![
            Expr::eq(rival.clone(), candidate.clone()),
            Expr::all(vec![Expr::IsNull(rival), Expr::IsNull(candidate)]),
        ]);
        join.then_rank(Some(beats), ties);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::IdentityDeclaration;

    #[test]
    fn test_orders_by_version_descending() {
        let version = Version::new();
        let meta = DimensionMetadata {
            property: "version".to_string(),
            marker: Marker::VERSION,
        };
        let mut query = Query::select("ContentVersion", "v");
        version
            .apply_to_variant_query(&mut query, &meta, &ResolvedValue::Unrestricted)
            .unwrap();
        assert_eq!(query.to_string(), "SELECT v FROM ContentVersion v ORDER BY v.version DESC");
    }

    #[test]
    fn test_order_join_prefers_highest_version() {
        let meta = DimensionMetadata {
            property: "version".to_string(),
            marker: Marker::VERSION,
        };
        let mut query = Query::select("Content", "i");
        let mut join = OrderJoin::new(
            &mut query,
            Arc::new(IdentityDeclaration::new("ContentVersion")),
            "i",
            "o",
            "r",
        );
        assert!(Version::new()
            .constrain_order_join(&mut join, &meta, &ResolvedValue::Unrestricted)
            .unwrap());
        let on = join.into_conditions();
        assert_eq!(on.len(), 2);
        let rivals = on[1].to_string();
        assert!(rivals.starts_with("NOT EXISTS (SELECT 1 FROM ContentVersion r WHERE r.identity = i.id"));
        assert!(rivals.contains("r.version > o.version"));
        assert!(rivals.contains("r.version IS NOT NULL AND o.version IS NULL"));
        assert!(rivals.contains("r.id < o.id"));
    }
}
