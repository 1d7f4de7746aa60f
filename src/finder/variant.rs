use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, VariantOverrides};
use crate::error::{ContentResult, ExecutionError};
use crate::metadata::MetadataRegistry;
use crate::plugins::PluginSet;
use crate::query::{Direction, Expr, Operand, Query, SortExpr};
use crate::record::{EntityType, Record};
use crate::storage::RecordStore;

use super::IdentityQueryRestrictor;

/// Selects the single best Variant of one Identity.
///
/// One query over the Variant type, filtered to the Identity's rows. Every
/// registered Dimension, then every Filter, whose marker is present on the
/// Variant type adds its filtering and ordering in registration order, so
/// earlier plugins' sort keys take priority. The first row wins.
#[derive(Clone)]
pub struct VariantFinder {
    registry: Arc<MetadataRegistry>,
    plugins: Arc<PluginSet>,
    store: Arc<dyn RecordStore>,
    restrictor: IdentityQueryRestrictor,
}

impl VariantFinder {
    /// Creates a finder with a default-depth restrictor.
    #[must_use]
    pub fn new(
        registry: Arc<MetadataRegistry>,
        plugins: Arc<PluginSet>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let restrictor = IdentityQueryRestrictor::new(Arc::clone(&registry), Arc::clone(&plugins));
        Self {
            registry,
            plugins,
            store,
            restrictor,
        }
    }

    /// Replaces the restrictor used for multi-level chains (e.g. to change
    /// the depth limit).
    #[must_use]
    pub fn with_restrictor(mut self, restrictor: IdentityQueryRestrictor) -> Self {
        self.restrictor = restrictor;
        self
    }

    /// Metadata registry the finder reads declarations from.
    #[must_use]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// Builds the variant query for `identity` without running it.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::MissingIdentityDeclaration` when the
    /// identity's type has no declaration, and plugin validation errors.
    pub fn variant_query(
        &self,
        identity: &Record,
        context: &Context,
        overrides: &VariantOverrides,
    ) -> ContentResult<Query> {
        let declaration = self
            .registry
            .get_identity_declaration(&identity.entity_type)?
            .ok_or_else(|| ExecutionError::MissingIdentityDeclaration {
                entity_type: identity.entity_type.clone(),
            })?;
        let variant_type = &declaration.variant_type;

        let mut query = Query::select(variant_type.clone(), "v");
        let owner = query.parameter("identity", identity.reference());
        query.and_where(Expr::eq(query.field(&declaration.identity_property), owner));

        for dimension in self.plugins.dimensions() {
            let Some(metadata) = self
                .registry
                .get_dimension_metadata(variant_type, dimension.marker())?
            else {
                continue;
            };
            let value = overrides
                .dimension(dimension.key())
                .or_else(|| context.dimension(dimension.key()));
            if let Some(value) = value {
                dimension.apply_to_variant_query(&mut query, &metadata, value)?;
            }
        }
        for filter in self.plugins.filters() {
            let Some(metadata) = self
                .registry
                .get_filter_metadata(variant_type, filter.marker())?
            else {
                continue;
            };
            if let Some(value) = context.filter(filter.key()) {
                filter.apply_to_variant_query(&mut query, &metadata, value)?;
            }
        }

        // Rows equal on every plugin key are split by id.
        let id = Operand::row(query.alias.clone());
        query.add_order_by(SortExpr::Operand(id), Direction::Asc);

        // A variant that is itself an identity must have a matching variant of its own.
        self.restrictor.restrict(&mut query, variant_type, context)?;
        query.set_max_results(1);
        Ok(query)
    }

    /// Returns the best-matching Variant of `identity`, or `None`.
    ///
    /// # Errors
    ///
    /// See [`Self::variant_query`]; storage errors are propagated.
    pub fn find_best_variant(
        &self,
        identity: &Record,
        context: &Context,
        overrides: &VariantOverrides,
    ) -> ContentResult<Option<Record>> {
        let query = self.variant_query(identity, context, overrides)?;
        let variant = self.store.fetch(&query)?.into_iter().next();
        debug!(
            identity_type = %identity.entity_type,
            identity = %identity.id,
            query = %query,
            found = ?variant.as_ref().map(|v| v.id.as_str()),
            "resolved best variant"
        );
        Ok(variant)
    }

    /// The Variant type declared by `identity_type`, if any.
    ///
    /// # Errors
    ///
    /// Returns malformed-declaration errors from the registry.
    pub fn variant_type_of(&self, identity_type: &EntityType) -> ContentResult<Option<EntityType>> {
        Ok(self
            .registry
            .get_identity_declaration(identity_type)?
            .map(|d| d.variant_type.clone()))
    }
}

impl std::fmt::Debug for VariantFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantFinder")
            .field("plugins", &self.plugins)
            .field("restrictor", &self.restrictor)
            .finish_non_exhaustive()
    }
}
