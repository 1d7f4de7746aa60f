//! Filters: narrowing predicates on Variant rows.
//!
//! A Filter has a per-request resolved value but no ordering role. Like a
//! Dimension it contributes to the shared existence check of an Identity
//! query and to direct Variant queries.

mod archivable;
mod publishable;

pub use archivable::Archivable;
pub use publishable::{Publishable, PublishableMode, PublishableResolvedValue};

use crate::context::{RequestScope, ResolvedValue};
use crate::error::ContentResult;
use crate::finder::IdentityConstraint;
use crate::metadata::FilterMetadata;
use crate::query::Query;
use crate::schema::Marker;

/// A pluggable Filter strategy.
pub trait Filter: Send + Sync {
    /// Key under which the resolved value is stored in the context.
    fn key(&self) -> &str;

    /// Marker of the Variant property this filter applies to.
    fn marker(&self) -> &Marker;

    /// Resolves the filter value for a request. Called once per context.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unusable request attributes.
    fn resolve_value(&self, scope: &RequestScope) -> ContentResult<ResolvedValue>;

    /// Adds conditions to the shared existence check. Returns whether anything
    /// was added to the shared candidate.
    ///
    /// # Errors
    ///
    /// Returns a validation error for resolved values the filter rejects.
    fn apply_to_identity_query(
        &self,
        constraint: &mut IdentityConstraint<'_>,
        metadata: &FilterMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool>;

    /// Adds filtering to a direct query over Variant rows.
    ///
    /// # Errors
    ///
    /// Returns a validation error for resolved values the filter rejects.
    fn apply_to_variant_query(
        &self,
        query: &mut Query,
        metadata: &FilterMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<()>;
}
