//! Query-builder boundary.
//!
//! The engine never executes queries itself; it emits constraints into a
//! [`Query`] which a [`RecordStore`](crate::storage::RecordStore) executes.
//! The model covers what restriction and variant selection need: comparison,
//! membership and null predicates, AND/OR/NOT grouping, correlated `EXISTS`,
//! named parameters, left joins with compound ON-conditions and multi-key
//! ORDER BY.

mod expr;
mod names;
mod render;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use expr::{CmpOp, Direction, Expr, Join, Operand, OrderKey, SortExpr, SubQuery};
pub use names::NameGenerator;

use crate::record::EntityType;
use crate::value::Value;

/// A select over one root entity type.
///
/// Results are root rows: joins only feed ordering and filtering, and a root
/// matched through several join rows is returned once, at its first position.
///
/// # Examples
///
/// ```
/// use content_elements::query::{Expr, Operand, Query};
///
/// let mut query = Query::select("ArticleVariant", "v");
/// let locale = query.parameter("locale", "en");
/// query.and_where(Expr::eq(query.field("locale"), locale));
/// query.set_max_results(1);
///
/// assert_eq!(
///     query.to_string(),
///     "SELECT v FROM ArticleVariant v WHERE v.locale = :locale_0 LIMIT 1"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Root type selected.
    pub entity_type: EntityType,
    /// Alias of the root row.
    pub alias: String,
    /// WHERE conjunction.
    pub conditions: Vec<Expr>,
    /// Left joins, in order.
    pub joins: Vec<Join>,
    /// Sort keys, most significant first.
    pub order_by: Vec<OrderKey>,
    /// Bound parameters by name.
    pub params: BTreeMap<String, Value>,
    /// Maximum number of rows returned.
    pub limit: Option<usize>,
    names: NameGenerator,
}

impl Query {
    /// Starts a select over `entity_type` bound to `alias`.
    #[must_use]
    pub fn select(entity_type: impl Into<EntityType>, alias: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            alias: alias.into(),
            conditions: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            params: BTreeMap::new(),
            limit: None,
            names: NameGenerator::new(),
        }
    }

    /// `root_alias.property`.
    #[must_use]
    pub fn field(&self, property: &str) -> Operand {
        Operand::field(self.alias.clone(), property)
    }

    /// Adds a condition AND-ed with the existing ones.
    pub fn and_where(&mut self, condition: Expr) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Binds a named parameter, replacing any previous value.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Binds `value` under a fresh name derived from `prefix` and returns it as an operand.
    pub fn parameter(&mut self, prefix: &str, value: impl Into<Value>) -> Operand {
        let name = self.names.parameter(prefix);
        self.params.insert(name.clone(), value.into());
        Operand::Param(name)
    }

    /// Returns a fresh alias derived from `prefix`.
    pub fn generate_alias(&mut self, prefix: &str) -> String {
        self.names.alias(prefix)
    }

    /// Adds a left join.
    pub fn left_join(
        &mut self,
        entity_type: EntityType,
        alias: impl Into<String>,
        on: Vec<Expr>,
    ) -> &mut Self {
        self.joins.push(Join {
            entity_type,
            alias: alias.into(),
            on,
        });
        self
    }

    /// Appends an ORDER BY key after the existing ones.
    pub fn add_order_by(&mut self, expr: SortExpr, direction: Direction) -> &mut Self {
        self.order_by.push(OrderKey::new(expr, direction));
        self
    }

    /// Caps the result size.
    pub fn set_max_results(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if any condition, at any depth, is an `EXISTS`.
    #[must_use]
    pub fn has_exists(&self) -> bool {
        fn walk(expr: &Expr) -> bool {
            match expr {
                Expr::Exists(_) => true,
                Expr::And(items) | Expr::Or(items) => items.iter().any(walk),
                Expr::Not(inner) => walk(inner),
                _ => false,
            }
        }
        self.conditions.iter().any(walk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_get_unique_names() {
        let mut query = Query::select("ArticleVariant", "v");
        let a = query.parameter("locale", "en");
        let b = query.parameter("locale", "fr");
        assert_ne!(a, b);
        assert_eq!(query.params.len(), 2);
    }

    #[test]
    fn test_generated_aliases_are_unique() {
        let mut query = Query::select("Article", "a");
        assert_ne!(query.generate_alias("variant"), query.generate_alias("variant"));
    }

    #[test]
    fn test_has_exists_walks_nested_groups() {
        let mut query = Query::select("Article", "a");
        assert!(!query.has_exists());
        query.and_where(Expr::Or(vec![
            Expr::IsNull(query.field("slug")),
            Expr::not_exists(SubQuery::new(EntityType::new("ArticleVariant"), "v")),
        ]));
        assert!(query.has_exists());
    }
}
