//! Predicate and ordering expressions.

use serde::{Deserialize, Serialize};

use crate::record::EntityType;
use crate::value::Value;

/// A value position inside an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// `alias.property`. The property `id` reads as a reference to the row itself.
    Field {
        /// Row alias.
        alias: String,
        /// Property read from the row.
        property: String,
    },
    /// Named query parameter.
    Param(String),
    /// Inline constant.
    Literal(Value),
}

impl Operand {
    /// `alias.property`.
    #[must_use]
    pub fn field(alias: impl Into<String>, property: impl Into<String>) -> Self {
        Self::Field {
            alias: alias.into(),
            property: property.into(),
        }
    }

    /// The row bound to `alias`, as a reference value.
    #[must_use]
    pub fn row(alias: impl Into<String>) -> Self {
        Self::field(alias, "id")
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    /// Rendered operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Correlated subquery used by `EXISTS`. Conditions are AND-ed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Type scanned by the subquery.
    pub entity_type: EntityType,
    /// Alias of the scanned row.
    pub alias: String,
    /// Conjunction the row must satisfy.
    pub conditions: Vec<Expr>,
}

impl SubQuery {
    /// Subquery over `entity_type` with no conditions.
    #[must_use]
    pub fn new(entity_type: EntityType, alias: impl Into<String>) -> Self {
        Self {
            entity_type,
            alias: alias.into(),
            conditions: Vec::new(),
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn and_where(mut self, condition: Expr) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Boolean expression evaluated with SQL three-valued logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Binary comparison; unknown if either side is null.
    Compare {
        /// Left side.
        left: Operand,
        /// Operator.
        op: CmpOp,
        /// Right side.
        right: Operand,
    },
    /// Membership of `operand` in a list-valued operand.
    In {
        /// Value tested.
        operand: Operand,
        /// List searched.
        list: Operand,
    },
    /// `IS NULL`
    IsNull(Operand),
    /// `IS NOT NULL`
    IsNotNull(Operand),
    /// Conjunction.
    And(Vec<Expr>),
    /// Disjunction.
    Or(Vec<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// True when the subquery yields a row.
    Exists(Box<SubQuery>),
}

impl Expr {
    /// `left op right`.
    #[must_use]
    pub fn compare(left: Operand, op: CmpOp, right: Operand) -> Self {
        Self::Compare { left, op, right }
    }

    /// `left = right`.
    #[must_use]
    pub fn eq(left: Operand, right: Operand) -> Self {
        Self::compare(left, CmpOp::Eq, right)
    }

    /// `left <= right`.
    #[must_use]
    pub fn le(left: Operand, right: Operand) -> Self {
        Self::compare(left, CmpOp::Le, right)
    }

    /// `operand IN (list)`.
    #[must_use]
    pub fn is_in(operand: Operand, list: Operand) -> Self {
        Self::In { operand, list }
    }

    /// `EXISTS (subquery)`.
    #[must_use]
    pub fn exists(subquery: SubQuery) -> Self {
        Self::Exists(Box::new(subquery))
    }

    /// `NOT EXISTS (subquery)`.
    #[must_use]
    pub fn not_exists(subquery: SubQuery) -> Self {
        Self::negate(Self::exists(subquery))
    }

    /// `NOT (expr)`.
    #[must_use]
    pub fn negate(expr: Self) -> Self {
        Self::Not(Box::new(expr))
    }

    /// AND of `exprs`, unwrapped when there is only one.
    #[must_use]
    pub fn all(mut exprs: Vec<Self>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Self::And(exprs)
        }
    }

    /// OR of `exprs`, unwrapped when there is only one.
    #[must_use]
    pub fn any(mut exprs: Vec<Self>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Self::Or(exprs)
        }
    }
}

/// Sort direction. Parsing is lenient: anything other than `desc` is ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending, nulls first.
    #[default]
    Asc,
    /// Descending, nulls last.
    Desc,
}

impl Direction {
    /// Parses a direction keyword.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    /// Rendered keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sort expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortExpr {
    /// Sort by a value.
    Operand(Operand),
    /// `CASE WHEN arm THEN rank ... ELSE otherwise END`; the first true arm wins.
    Case {
        /// Conditions with their ranks, in priority order.
        arms: Vec<(Expr, i64)>,
        /// Rank when no arm holds.
        otherwise: i64,
    },
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    /// Sorted expression.
    pub expr: SortExpr,
    /// Direction.
    pub direction: Direction,
}

impl OrderKey {
    /// Key sorting `expr` in `direction`.
    #[must_use]
    pub fn new(expr: SortExpr, direction: Direction) -> Self {
        Self { expr, direction }
    }
}

/// Left join. Rows without a match bind the alias to nothing, reading every field as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Joined type.
    pub entity_type: EntityType,
    /// Alias of the joined row.
    pub alias: String,
    /// Join conditions, AND-ed.
    pub on: Vec<Expr>,
}
