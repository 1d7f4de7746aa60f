//! Sorting Identity collections by a field of their resolved Variant.
//!
//! A requested sort key such as `title` is mapped to a Variant field and
//! turned into a left join from the Identity to exactly one Variant row: the
//! row the variant finder picks for this request. The joined row must pass
//! every active Dimension and Filter, and no other such row of the same
//! Identity may outrank it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, ResolvedValue};
use crate::error::{ContentResult, ValidationError};
use crate::finder::{IdentityConstraint, IdentityQueryRestrictor};
use crate::metadata::{DimensionMetadata, MetadataRegistry};
use crate::plugins::PluginSet;
use crate::query::{CmpOp, Direction, Expr, Operand, Query, SortExpr, SubQuery};
use crate::record::EntityType;
use crate::schema::IdentityDeclaration;
use crate::value::Value;

/// Contributes one dimension to the sort join.
///
/// A selector mirrors what its dimension does to direct Variant queries:
/// the rows it accepts and the order it ranks them in. Dimensions without a
/// selector do not take part in choosing the joined row.
pub trait VariantOrderSelector: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Key of the dimension whose resolved value drives this selector.
    fn dimension_key(&self) -> Option<&str>;

    /// Narrows the candidate rows with [`OrderJoin::and_visible`] and adds
    /// this dimension's sort key with [`OrderJoin::then_rank`]. Returns
    /// `false` when the value cannot single out one variant per identity;
    /// the sort key is then skipped for this request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for resolved values the selector rejects.
    fn constrain_order_join(
        &self,
        join: &mut OrderJoin<'_>,
        metadata: &DimensionMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool>;
}

/// The Variant row joined for sorting, and the rows of the same Identity it
/// has to outrank (its rivals).
///
/// The join condition reads: the row is visible, and no visible rival sorts
/// before it. Sort keys compare lexicographically in the order they were
/// added; rows equal on every key are split by id, as in the variant query.
#[derive(Debug)]
pub struct OrderJoin<'q> {
    query: &'q mut Query,
    declaration: Arc<IdentityDeclaration>,
    identity_alias: String,
    candidate: String,
    rival: String,
    candidate_conditions: Vec<Expr>,
    rival_conditions: Vec<Expr>,
    ranks: Vec<(Option<Expr>, Expr)>,
}

impl<'q> OrderJoin<'q> {
    pub(crate) fn new(
        query: &'q mut Query,
        declaration: Arc<IdentityDeclaration>,
        identity_alias: impl Into<String>,
        candidate: impl Into<String>,
        rival: impl Into<String>,
    ) -> Self {
        Self {
            query,
            declaration,
            identity_alias: identity_alias.into(),
            candidate: candidate.into(),
            rival: rival.into(),
            candidate_conditions: Vec::new(),
            rival_conditions: Vec::new(),
            ranks: Vec::new(),
        }
    }

    /// The joined Variant type.
    #[must_use]
    pub fn variant_type(&self) -> &EntityType {
        &self.declaration.variant_type
    }

    /// `property` of the joined row.
    #[must_use]
    pub fn candidate_field(&self, property: &str) -> Operand {
        Operand::field(self.candidate.clone(), property)
    }

    /// `property` of a competing row.
    #[must_use]
    pub fn rival_field(&self, property: &str) -> Operand {
        Operand::field(self.rival.clone(), property)
    }

    /// Binds a parameter on the enclosing query.
    pub fn parameter(&mut self, prefix: &str, value: impl Into<Value>) -> Operand {
        self.query.parameter(prefix, value)
    }

    /// Requires `condition(alias)` of the joined row and of every rival.
    pub fn and_visible(&mut self, condition: impl Fn(&str) -> Expr) {
        self.candidate_conditions.push(condition(&self.candidate));
        self.rival_conditions.push(condition(&self.rival));
    }

    /// Adds the next sort key. `beats` holds when the rival sorts strictly
    /// before the joined row, `ties` when both sort equal; `None` means no
    /// rival can sort strictly before it.
    pub fn then_rank(&mut self, beats: Option<Expr>, ties: Expr) {
        self.ranks.push((beats, ties));
    }

    fn aliases(&self) -> (String, String, String) {
        (self.identity_alias.clone(), self.candidate.clone(), self.rival.clone())
    }

    fn extend_visible(&mut self, candidate: Vec<Expr>, rival: Vec<Expr>) {
        self.candidate_conditions.extend(candidate);
        self.rival_conditions.extend(rival);
    }

    fn correlate(&self, alias: &str) -> Expr {
        Expr::eq(
            Operand::field(alias, self.declaration.identity_property.clone()),
            Operand::row(self.identity_alias.clone()),
        )
    }

    /// ON-conditions of the join.
    pub(crate) fn into_conditions(self) -> Vec<Expr> {
        let candidate_correlation = self.correlate(&self.candidate);
        let rival_correlation = self.correlate(&self.rival);

        let mut outranks = Expr::compare(
            Operand::row(self.rival.clone()),
            CmpOp::Lt,
            Operand::row(self.candidate.clone()),
        );
        for (beats, ties) in self.ranks.into_iter().rev() {
            let tied = Expr::all(vec![ties, outranks]);
            outranks = match beats {
                Some(beats) => Expr::any(vec![beats, tied]),
                None => tied,
            };
        }

        let mut rival =
            SubQuery::new(self.declaration.variant_type.clone(), self.rival).and_where(rival_correlation);
        rival.conditions.extend(self.rival_conditions);
        rival.conditions.push(outranks);

        let mut on = Vec::with_capacity(self.candidate_conditions.len() + 2);
        on.push(candidate_correlation);
        on.extend(self.candidate_conditions);
        on.push(Expr::not_exists(rival));
        on
    }
}

/// Applies `variant.<field>` sort keys to Identity queries.
///
/// Built from a map of request sort key to Variant field. Unknown sort keys
/// are ignored.
pub struct VariantOrderFilter {
    registry: Arc<MetadataRegistry>,
    plugins: Arc<PluginSet>,
    restrictor: IdentityQueryRestrictor,
    properties: BTreeMap<String, String>,
}

impl VariantOrderFilter {
    /// Creates a filter sorting by the given `(sort key, variant field)` pairs.
    #[must_use]
    pub fn new<K, V>(
        registry: Arc<MetadataRegistry>,
        plugins: Arc<PluginSet>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let restrictor = IdentityQueryRestrictor::new(Arc::clone(&registry), Arc::clone(&plugins));
        Self {
            registry,
            plugins,
            restrictor,
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Limits nesting when the joined Variant is itself an Identity.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.restrictor = self.restrictor.with_max_depth(max_depth);
        self
    }

    /// Request parameters this filter understands, e.g. `order[title]`.
    #[must_use]
    pub fn order_parameters(&self) -> Vec<String> {
        self.properties.keys().map(|k| format!("order[{k}]")).collect()
    }

    /// Applies the requested sort keys, in order. Returns how many were applied.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a selector has no dimension key or
    /// rejects its resolved value, and propagates metadata errors.
    pub fn apply<K, D>(
        &self,
        query: &mut Query,
        identity_type: &EntityType,
        requested: impl IntoIterator<Item = (K, D)>,
        context: &Context,
    ) -> ContentResult<usize>
    where
        K: AsRef<str>,
        D: AsRef<str>,
    {
        let Some(declaration) = self.registry.get_identity_declaration(identity_type)? else {
            return Ok(0);
        };
        if let Some(selector) = self.plugins.selectors().iter().find(|s| s.dimension_key().is_none()) {
            return Err(ValidationError::MissingSelectorKey {
                selector: selector.name().to_string(),
            }
            .into());
        }

        let mut applied = 0;
        for (key, direction) in requested {
            let key = key.as_ref();
            let Some(field) = self.properties.get(key) else {
                debug!(key, "ignoring unknown variant sort key");
                continue;
            };
            let direction = Direction::parse(direction.as_ref());
            let root_alias = query.alias.clone();
            let join_alias = query.generate_alias("variant_order");
            let rival_alias = query.generate_alias("rival");

            let mut join = OrderJoin::new(
                query,
                Arc::clone(&declaration),
                root_alias,
                join_alias.clone(),
                rival_alias,
            );
            if !self.rank(&mut join, context)? {
                debug!(key, "dimension matches all variants, skipping variant sort key");
                continue;
            }
            let (identity_alias, candidate, rival) = join.aliases();
            let candidate_visible = self.visibility(join.query, &declaration, &identity_alias, &candidate, context)?;
            let rival_visible = self.visibility(join.query, &declaration, &identity_alias, &rival, context)?;
            join.extend_visible(candidate_visible, rival_visible);

            let on = join.into_conditions();
            query.left_join(declaration.variant_type.clone(), join_alias.clone(), on);
            query.add_order_by(SortExpr::Operand(Operand::field(join_alias, field.clone())), direction);
            applied += 1;
        }

        if applied > 0 {
            debug!(identity_type = %identity_type, query = %query, "applied variant ordering");
        }
        Ok(applied)
    }

    /// Runs the selectors in dimension registration order, matching the
    /// order in which dimensions rank direct Variant queries.
    fn rank(&self, join: &mut OrderJoin<'_>, context: &Context) -> ContentResult<bool> {
        let variant_type = join.variant_type().clone();
        for dimension in self.plugins.dimensions() {
            let Some(selector) = self
                .plugins
                .selectors()
                .iter()
                .find(|s| s.dimension_key() == Some(dimension.key()))
            else {
                continue;
            };
            let Some(metadata) = self
                .registry
                .get_dimension_metadata(&variant_type, dimension.marker())?
            else {
                continue;
            };
            let Some(value) = context.dimension(dimension.key()) else {
                continue;
            };
            if !selector.constrain_order_join(join, &metadata, value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Filter conditions on the row bound to `variant_alias`, plus the
    /// restriction of its own variants when it is itself an identity.
    fn visibility(
        &self,
        query: &mut Query,
        declaration: &Arc<IdentityDeclaration>,
        identity_alias: &str,
        variant_alias: &str,
        context: &Context,
    ) -> ContentResult<Vec<Expr>> {
        let variant_type = &declaration.variant_type;
        let mut constraint =
            IdentityConstraint::new(query, Arc::clone(declaration), identity_alias, variant_alias);
        for filter in self.plugins.filters() {
            let Some(metadata) = self.registry.get_filter_metadata(variant_type, filter.marker())? else {
                continue;
            };
            let Some(value) = context.filter(filter.key()) else {
                continue;
            };
            filter.apply_to_identity_query(&mut constraint, &metadata, value)?;
        }
        let (mut conditions, _) = constraint.into_parts();
        conditions.extend(
            self.restrictor
                .conditions_on(query, variant_type, variant_alias, context)?,
        );
        Ok(conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::schema::{Marker, PropertyDecl, Schema, TypeSchema};

    fn filter() -> VariantOrderFilter {
        let schema = Schema::new()
            .with_type(TypeSchema::new("Article").identity(IdentityDeclaration::new("ArticleVariant")))
            .with_type(
                TypeSchema::new("ArticleVariant")
                    .property(PropertyDecl::new("identity").references("Article"))
                    .property(PropertyDecl::new("locale").dimension(Marker::LOCALE))
                    .property(PropertyDecl::new("archivedAt").filter(Marker::ARCHIVABLE)),
            );
        VariantOrderFilter::new(
            Arc::new(MetadataRegistry::new(Arc::new(schema))),
            Arc::new(PluginSet::standard(&ContentConfig::default())),
            [("publishAt", "publishAt")],
        )
    }

    fn context(chain: &[&str]) -> Context {
        Context::new().with_dimension("locale", ResolvedValue::chain(chain))
    }

    #[test]
    fn test_joins_variant_in_active_locale() {
        let mut query = Query::select("Article", "o");
        let applied = filter()
            .apply(&mut query, &EntityType::new("Article"), [("publishAt", "desc")], &context(&["en"]))
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(
            query.to_string(),
            "SELECT o FROM Article o LEFT JOIN ArticleVariant variant_order_0 \
             ON variant_order_0.identity = o.id AND variant_order_0.locale IN (:order_locale_0) \
             AND NOT EXISTS (SELECT 1 FROM ArticleVariant rival_1 WHERE rival_1.identity = o.id \
             AND rival_1.locale IN (:order_locale_0) \
             AND (rival_1.locale = variant_order_0.locale AND rival_1.id < variant_order_0.id)) \
             ORDER BY variant_order_0.publishAt DESC"
        );
    }

    #[test]
    fn test_join_applies_filters_to_joined_row_and_rivals() {
        let mut query = Query::select("Article", "o");
        let ctx = context(&["en"]).with_filter("archivable", ResolvedValue::Flag(true));
        filter()
            .apply(&mut query, &EntityType::new("Article"), [("publishAt", "asc")], &ctx)
            .unwrap();
        let on = &query.joins[0].on;
        assert_eq!(on[2].to_string(), "variant_order_0.archivedAt IS NULL");
        let Expr::Not(rival) = &on[3] else {
            panic!("expected NOT EXISTS, got {}", on[3]);
        };
        let Expr::Exists(rival) = rival.as_ref() else {
            panic!("expected NOT EXISTS");
        };
        assert!(rival
            .conditions
            .contains(&Expr::IsNull(Operand::field("rival_1", "archivedAt"))));
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut query = Query::select("Article", "o");
        let applied = filter()
            .apply(&mut query, &EntityType::new("Article"), [("title", "asc")], &context(&["en"]))
            .unwrap();
        assert_eq!(applied, 0);
        assert!(query.joins.is_empty());
    }

    #[test]
    fn test_all_mode_skips_key() {
        let mut query = Query::select("Article", "o");
        let applied = filter()
            .apply(
                &mut query,
                &EntityType::new("Article"),
                [("publishAt", "asc")],
                &context(&["en", "!en"]),
            )
            .unwrap();
        assert_eq!(applied, 0);
        assert!(query.order_by.is_empty());
    }

    #[test]
    fn test_unrestricted_context_adds_no_join() {
        let mut query = Query::select("Article", "o");
        let ctx = Context::new().with_dimension("locale", ResolvedValue::Unrestricted);
        let applied = filter()
            .apply(&mut query, &EntityType::new("Article"), [("publishAt", "asc")], &ctx)
            .unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn test_order_parameters() {
        assert_eq!(filter().order_parameters(), vec!["order[publishAt]"]);
    }
}
