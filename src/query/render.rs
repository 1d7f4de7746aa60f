//! DQL-like text rendering, used in logs and tests.

use std::fmt::{self, Display, Formatter};

use super::expr::{Expr, Join, Operand, OrderKey, SortExpr, SubQuery};
use super::Query;

fn write_conditions(f: &mut Formatter<'_>, conditions: &[Expr]) -> fmt::Result {
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            f.write_str(" AND ")?;
        }
        write!(f, "{condition}")?;
    }
    Ok(())
}

fn write_group(f: &mut Formatter<'_>, items: &[Expr], keyword: &str, empty: &str) -> fmt::Result {
    if items.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " {keyword} ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { alias, property } => write!(f, "{alias}.{property}"),
            Self::Param(name) => write!(f, ":{name}"),
            Self::Literal(value) => write!(f, "{value}"),
        }
    }
}

impl Display for SubQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT 1 FROM {} {}", self.entity_type, self.alias)?;
        if !self.conditions.is_empty() {
            f.write_str(" WHERE ")?;
            write_conditions(f, &self.conditions)?;
        }
        Ok(())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { left, op, right } => write!(f, "{left} {} {right}", op.symbol()),
            Self::In { operand, list } => write!(f, "{operand} IN ({list})"),
            Self::IsNull(operand) => write!(f, "{operand} IS NULL"),
            Self::IsNotNull(operand) => write!(f, "{operand} IS NOT NULL"),
            Self::And(items) => write_group(f, items, "AND", "1 = 1"),
            Self::Or(items) => write_group(f, items, "OR", "1 = 0"),
            Self::Not(inner) => match inner.as_ref() {
                Self::Exists(_) => write!(f, "NOT {inner}"),
                _ => write!(f, "NOT ({inner})"),
            },
            Self::Exists(subquery) => write!(f, "EXISTS ({subquery})"),
        }
    }
}

impl Display for SortExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand(operand) => write!(f, "{operand}"),
            Self::Case { arms, otherwise } => {
                f.write_str("CASE")?;
                for (condition, rank) in arms {
                    write!(f, " WHEN {condition} THEN {rank}")?;
                }
                write!(f, " ELSE {otherwise} END")
            }
        }
    }
}

impl Display for OrderKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, self.direction.keyword())
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "LEFT JOIN {} {}", self.entity_type, self.alias)?;
        if !self.on.is_empty() {
            f.write_str(" ON ")?;
            write_conditions(f, &self.on)?;
        }
        Ok(())
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {} FROM {} {}", self.alias, self.entity_type, self.alias)?;
        for join in &self.joins {
            write!(f, " {join}")?;
        }
        if !self.conditions.is_empty() {
            f.write_str(" WHERE ")?;
            write_conditions(f, &self.conditions)?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            for (i, key) in self.order_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}")?;
            }
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}
