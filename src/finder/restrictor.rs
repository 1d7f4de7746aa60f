//! Restricting Identity queries to Identities with a matching Variant.

use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::{ContentResult, ExecutionError};
use crate::metadata::MetadataRegistry;
use crate::plugins::PluginSet;
use crate::query::{Expr, Query, SubQuery};
use crate::record::EntityType;

use super::IdentityConstraint;

/// Default limit on nested Identity/Variant levels.
pub const DEFAULT_MAX_IDENTITY_DEPTH: usize = 8;

/// Adds one shared `EXISTS` per Identity level to a query.
///
/// Every plugin writes into the same subquery, so all criteria are checked
/// against the same candidate Variant row:
///
/// ```text
/// EXISTS (SELECT 1 FROM Variant v WHERE v.identity = i.id AND <every contribution>)
/// ```
///
/// When the Variant type is itself an Identity, the next level's check is
/// nested inside this one.
#[derive(Debug, Clone)]
pub struct IdentityQueryRestrictor {
    registry: Arc<MetadataRegistry>,
    plugins: Arc<PluginSet>,
    max_depth: usize,
}

impl IdentityQueryRestrictor {
    /// Restrictor applying every plugin in `plugins`.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, plugins: Arc<PluginSet>) -> Self {
        Self {
            registry,
            plugins,
            max_depth: DEFAULT_MAX_IDENTITY_DEPTH,
        }
    }

    /// Limits how deep nested identity chains are followed.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Restricts `query` (rooted at an `identity_type` row) to identities
    /// having a Variant that satisfies every active Dimension and Filter.
    ///
    /// Types without an identity declaration are left untouched, as is the
    /// query when no plugin contributes. Returns whether anything was added.
    ///
    /// # Errors
    ///
    /// Returns metadata and plugin validation errors, and
    /// `ExecutionError::IdentityChainTooDeep` for over-deep chains.
    pub fn restrict(
        &self,
        query: &mut Query,
        identity_type: &EntityType,
        context: &Context,
    ) -> ContentResult<bool> {
        let root = query.alias.clone();
        let conditions = self.constraints_for(query, identity_type, &root, context, 0)?;
        if conditions.is_empty() {
            return Ok(false);
        }
        for condition in conditions {
            query.and_where(condition);
        }
        debug!(identity_type = %identity_type, query = %query, "restricted identity query");
        Ok(true)
    }

    /// Restriction conditions on a row of `identity_type` bound to `alias`
    /// elsewhere in `query` (e.g. a joined variant that is itself an identity).
    pub(crate) fn conditions_on(
        &self,
        query: &mut Query,
        identity_type: &EntityType,
        alias: &str,
        context: &Context,
    ) -> ContentResult<Vec<Expr>> {
        self.constraints_for(query, identity_type, alias, context, 0)
    }

    /// Conditions on the row bound to `identity_alias`. Empty when nothing applies.
    fn constraints_for(
        &self,
        query: &mut Query,
        identity_type: &EntityType,
        identity_alias: &str,
        context: &Context,
        depth: usize,
    ) -> ContentResult<Vec<Expr>> {
        let Some(declaration) = self.registry.get_identity_declaration(identity_type)? else {
            return Ok(Vec::new());
        };
        if depth >= self.max_depth {
            return Err(ExecutionError::IdentityChainTooDeep {
                entity_type: identity_type.clone(),
                max_depth: self.max_depth,
            }
            .into());
        }

        let variant_type = declaration.variant_type.clone();
        let variant_alias = query.generate_alias("variant");
        let mut constraint = IdentityConstraint::new(
            query,
            Arc::clone(&declaration),
            identity_alias,
            variant_alias.clone(),
        );

        let mut contributed = false;
        for dimension in self.plugins.dimensions() {
            let Some(metadata) = self
                .registry
                .get_dimension_metadata(&variant_type, dimension.marker())?
            else {
                continue;
            };
            let Some(value) = context.dimension(dimension.key()) else {
                continue;
            };
            contributed |= dimension.apply_to_identity_query(&mut constraint, &metadata, value)?;
        }
        for filter in self.plugins.filters() {
            let Some(metadata) = self
                .registry
                .get_filter_metadata(&variant_type, filter.marker())?
            else {
                continue;
            };
            let Some(value) = context.filter(filter.key()) else {
                continue;
            };
            contributed |= filter.apply_to_identity_query(&mut constraint, &metadata, value)?;
        }

        let correlation = constraint.correlate(&variant_alias);
        let (shared, mut identity) = constraint.into_parts();
        let nested = self.constraints_for(query, &variant_type, &variant_alias, context, depth + 1)?;

        if contributed || !nested.is_empty() {
            let mut subquery = SubQuery::new(variant_type, variant_alias).and_where(correlation);
            subquery.conditions.extend(shared);
            subquery.conditions.extend(nested);
            identity.insert(0, Expr::exists(subquery));
        }
        Ok(identity)
    }
}
