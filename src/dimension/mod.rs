//! Dimensions: axes of variation on Variant rows.
//!
//! A Dimension resolves a per-request value (e.g. a locale fallback chain),
//! contributes to the shared existence check of Identity queries, and ranks
//! candidate rows in direct Variant queries.

mod locale;
mod version;

pub use locale::{ChainMode, Locale, LocaleChain};
pub use version::Version;

use crate::context::{RequestScope, ResolvedValue};
use crate::error::ContentResult;
use crate::finder::IdentityConstraint;
use crate::metadata::DimensionMetadata;
use crate::query::Query;
use crate::schema::Marker;

/// A pluggable Dimension strategy.
pub trait Dimension: Send + Sync {
    /// Key under which the resolved value is stored in the context.
    fn key(&self) -> &str;

    /// Marker of the Variant property this dimension applies to.
    fn marker(&self) -> &Marker;

    /// Resolves the dimension value for a request. Called once per context.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unusable request attributes.
    fn resolve_value(&self, scope: &RequestScope) -> ContentResult<ResolvedValue>;

    /// Adds conditions to the shared existence check. Returns whether anything
    /// was added to the shared candidate; returning `false` must leave the
    /// shared check untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error for resolved values the dimension rejects.
    fn apply_to_identity_query(
        &self,
        constraint: &mut IdentityConstraint<'_>,
        metadata: &DimensionMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool>;

    /// Adds filtering and ordering to a direct query over Variant rows.
    ///
    /// # Errors
    ///
    /// Returns a validation error for resolved values the dimension rejects.
    fn apply_to_variant_query(
        &self,
        query: &mut Query,
        metadata: &DimensionMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<()>;
}
