//! Query execution over in-memory rows.
//!
//! Predicates follow SQL three-valued logic: a comparison touching `NULL` is
//! unknown (`None`), and only rows whose conditions are definitely true are
//! kept.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::query::{CmpOp, Direction, Expr, Operand, Query, SortExpr};
use crate::record::{EntityType, Record};
use crate::value::Value;

use super::StorageError;

/// Row access for the evaluator.
pub(crate) trait RowSource {
    /// All rows of a type, in insertion order.
    fn scan(&self, entity_type: &EntityType) -> Vec<&Record>;
}

type Bindings<'a> = Vec<(&'a str, Option<&'a Record>)>;

struct Evaluator<'a, S: RowSource> {
    source: &'a S,
    params: &'a BTreeMap<String, Value>,
}

impl<'a, S: RowSource> Evaluator<'a, S> {
    fn operand(&self, operand: &Operand, env: &Bindings<'a>) -> Result<Value, StorageError> {
        match operand {
            Operand::Field { alias, property } => {
                let (_, row) = env
                    .iter()
                    .rev()
                    .find(|(bound, _)| *bound == alias.as_str())
                    .ok_or_else(|| StorageError::UnknownAlias(alias.clone()))?;
                Ok(row.map_or(Value::Null, |r| r.value(property)))
            }
            Operand::Param(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| StorageError::UnboundParameter(name.clone())),
            Operand::Literal(value) => Ok(value.clone()),
        }
    }

    fn test(&self, expr: &'a Expr, env: &mut Bindings<'a>) -> Result<Option<bool>, StorageError> {
        match expr {
            Expr::Compare { left, op, right } => {
                let left = self.operand(left, env)?;
                let right = self.operand(right, env)?;
                Ok(left.sql_cmp(&right).map(|ord| match op {
                    CmpOp::Eq => ord == Ordering::Equal,
                    CmpOp::Ne => ord != Ordering::Equal,
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                }))
            }
            Expr::In { operand, list } => {
                let value = self.operand(operand, env)?;
                let list = self.operand(list, env)?;
                if value.is_null() || list.is_null() {
                    return Ok(None);
                }
                let items = match &list {
                    Value::List(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                let mut unknown = false;
                for item in items {
                    match value.sql_cmp(item) {
                        Some(Ordering::Equal) => return Ok(Some(true)),
                        None => unknown = true,
                        Some(_) => {}
                    }
                }
                Ok(if unknown { None } else { Some(false) })
            }
            Expr::IsNull(operand) => Ok(Some(self.operand(operand, env)?.is_null())),
            Expr::IsNotNull(operand) => Ok(Some(!self.operand(operand, env)?.is_null())),
            Expr::And(items) => self.test_all(items, env),
            Expr::Or(items) => {
                let mut unknown = false;
                for item in items {
                    match self.test(item, env)? {
                        Some(true) => return Ok(Some(true)),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                Ok(if unknown { None } else { Some(false) })
            }
            Expr::Not(inner) => Ok(self.test(inner, env)?.map(|b| !b)),
            Expr::Exists(subquery) => {
                for row in self.source.scan(&subquery.entity_type) {
                    env.push((subquery.alias.as_str(), Some(row)));
                    let verdict = self.test_all(&subquery.conditions, env);
                    env.pop();
                    if verdict? == Some(true) {
                        return Ok(Some(true));
                    }
                }
                Ok(Some(false))
            }
        }
    }

    fn test_all(&self, exprs: &'a [Expr], env: &mut Bindings<'a>) -> Result<Option<bool>, StorageError> {
        let mut unknown = false;
        for expr in exprs {
            match self.test(expr, env)? {
                Some(false) => return Ok(Some(false)),
                None => unknown = true,
                Some(true) => {}
            }
        }
        Ok(if unknown { None } else { Some(true) })
    }

    fn sort_value(&self, expr: &'a SortExpr, env: &mut Bindings<'a>) -> Result<Value, StorageError> {
        match expr {
            SortExpr::Operand(operand) => self.operand(operand, env),
            SortExpr::Case { arms, otherwise } => {
                for (condition, rank) in arms {
                    if self.test(condition, env)? == Some(true) {
                        return Ok(Value::Int(*rank));
                    }
                }
                Ok(Value::Int(*otherwise))
            }
        }
    }
}

/// Executes `query` against `source`.
pub(crate) fn execute<S: RowSource>(source: &S, query: &Query) -> Result<Vec<Record>, StorageError> {
    let eval = Evaluator {
        source,
        params: &query.params,
    };

    let mut matched: Vec<Bindings<'_>> = Vec::new();
    for root in source.scan(&query.entity_type) {
        let mut partial: Vec<Bindings<'_>> = vec![vec![(query.alias.as_str(), Some(root))]];
        for join in &query.joins {
            let candidates = source.scan(&join.entity_type);
            let mut next = Vec::with_capacity(partial.len());
            for mut env in partial {
                let mut any = false;
                for candidate in &candidates {
                    env.push((join.alias.as_str(), Some(*candidate)));
                    let verdict = eval.test_all(&join.on, &mut env);
                    let row = matches!(verdict, Ok(Some(true))).then(|| env.clone());
                    env.pop();
                    verdict?;
                    if let Some(row) = row {
                        next.push(row);
                        any = true;
                    }
                }
                if !any {
                    env.push((join.alias.as_str(), None));
                    next.push(env);
                }
            }
            partial = next;
        }
        for mut env in partial {
            if eval.test_all(&query.conditions, &mut env)? == Some(true) {
                matched.push(env);
            }
        }
    }

    if !query.order_by.is_empty() {
        let mut keyed = matched
            .into_iter()
            .map(|mut env| {
                let keys = query
                    .order_by
                    .iter()
                    .map(|key| eval.sort_value(&key.expr, &mut env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((keys, env))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        // Stable: rows with equal keys keep insertion order.
        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), key) in a.iter().zip(b.iter()).zip(&query.order_by) {
                let ord = match key.direction {
                    Direction::Asc => x.sort_cmp(y),
                    Direction::Desc => y.sort_cmp(x),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        matched = keyed.into_iter().map(|(_, env)| env).collect();
    }

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for env in matched {
        let Some(&(_, Some(root))) = env.first() else {
            continue;
        };
        if !seen.insert(&root.id) {
            continue;
        }
        results.push(root.clone());
        if query.limit.is_some_and(|limit| results.len() >= limit) {
            break;
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SubQuery;

    struct Rows(Vec<Record>);

    impl RowSource for Rows {
        fn scan(&self, entity_type: &EntityType) -> Vec<&Record> {
            self.0.iter().filter(|r| &r.entity_type == entity_type).collect()
        }
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    fn fixture() -> Rows {
        Rows(vec![
            Record::new("Article", "a"),
            Record::new("Article", "b"),
            Record::new("Article", "c"),
            Record::new("ArticleVariant", "a-en")
                .with_field("identity", crate::RecordId::new("a"))
                .with_field("locale", "en"),
            Record::new("ArticleVariant", "a-fr")
                .with_field("identity", crate::RecordId::new("a"))
                .with_field("locale", "fr"),
            Record::new("ArticleVariant", "b-de")
                .with_field("identity", crate::RecordId::new("b"))
                .with_field("locale", "de"),
        ])
    }

    fn variant_exists(alias: &str, extra: Expr) -> Expr {
        Expr::exists(
            SubQuery::new(EntityType::new("ArticleVariant"), alias)
                .and_where(Expr::eq(Operand::field(alias, "identity"), Operand::row("i")))
                .and_where(extra),
        )
    }

    #[test]
    fn test_correlated_exists() {
        let rows = fixture();
        let mut query = Query::select("Article", "i");
        let locale = query.parameter("locale", "fr");
        query.and_where(variant_exists("v", Expr::eq(Operand::field("v", "locale"), locale)));
        assert_eq!(ids(&execute(&rows, &query).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_not_exists() {
        let rows = fixture();
        let mut query = Query::select("Article", "i");
        let locale = query.parameter("locale", "de");
        query.and_where(Expr::negate(variant_exists(
            "v",
            Expr::eq(Operand::field("v", "locale"), locale),
        )));
        assert_eq!(ids(&execute(&rows, &query).unwrap()), vec!["a", "c"]);
    }

    #[test]
    fn test_null_comparison_filters_row_out_under_not() {
        let rows = Rows(vec![
            Record::new("ArticleVariant", "x").with_field("locale", "en"),
            Record::new("ArticleVariant", "y"),
        ]);
        let mut query = Query::select("ArticleVariant", "v");
        let en = query.parameter("locale", "en");
        query.and_where(Expr::negate(Expr::eq(query.field("locale"), en)));
        // NOT (NULL = 'en') is unknown, so `y` is not returned either.
        assert!(execute(&rows, &query).unwrap().is_empty());
    }

    #[test]
    fn test_left_join_ordering_dedups_roots() {
        let rows = fixture();
        let mut query = Query::select("Article", "i");
        query.left_join(
            EntityType::new("ArticleVariant"),
            "o",
            vec![Expr::eq(Operand::field("o", "identity"), Operand::row("i"))],
        );
        query.add_order_by(SortExpr::Operand(Operand::field("o", "locale")), Direction::Desc);

        // a-fr, a-en, b-de, then c with a NULL key
        assert_eq!(ids(&execute(&rows, &query).unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_case_rank_and_limit() {
        let rows = fixture();
        let mut query = Query::select("ArticleVariant", "v");
        let fr = query.parameter("locale", "fr");
        query.add_order_by(
            SortExpr::Case {
                arms: vec![(Expr::eq(query.field("locale"), fr), 0)],
                otherwise: 1,
            },
            Direction::Asc,
        );
        query.set_max_results(1);
        assert_eq!(ids(&execute(&rows, &query).unwrap()), vec!["a-fr"]);
    }

    #[test]
    fn test_in_with_list_parameter() {
        let rows = fixture();
        let mut query = Query::select("ArticleVariant", "v");
        let list = query.parameter("locales", vec!["de".to_string(), "fr".to_string()]);
        query.and_where(Expr::is_in(query.field("locale"), list));
        assert_eq!(ids(&execute(&rows, &query).unwrap()), vec!["a-fr", "b-de"]);
    }

    #[test]
    fn test_unbound_parameter_and_unknown_alias() {
        let rows = fixture();
        let mut query = Query::select("Article", "i");
        query.and_where(Expr::eq(query.field("slug"), Operand::Param("missing".to_string())));
        assert!(matches!(
            execute(&rows, &query),
            Err(StorageError::UnboundParameter(name)) if name == "missing"
        ));

        let mut query = Query::select("Article", "i");
        query.and_where(Expr::IsNull(Operand::field("nope", "slug")));
        assert!(matches!(execute(&rows, &query), Err(StorageError::UnknownAlias(_))));
    }
}
