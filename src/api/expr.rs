//! Typed predicate language
//!
//! Filters travel inside a `Select` as a tree of predicates over column
//! references and typed literals. Data sources decide which nodes they can
//! evaluate natively; see `datasource::filtering` for the pushdown policy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A literal value in a predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int64(i64),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Column(String),
    Value(TypedValue),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(name.into())
    }

    pub fn value(value: TypedValue) -> Self {
        Expression::Value(value)
    }
}

/// Boolean predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Comparison {
        op: ComparisonOp,
        left: Expression,
        right: Expression,
    },
    Conjunction(Vec<Predicate>),
    Disjunction(Vec<Predicate>),
    Negation(Box<Predicate>),
    IsNull(Expression),
    IsNotNull(Expression),
    In {
        value: Expression,
        set: Vec<Expression>,
    },
    Between {
        value: Expression,
        least: Expression,
        greatest: Expression,
    },
    /// SQL LIKE with `%` and `_` wildcards
    Like {
        value: Expression,
        pattern: String,
    },
    BoolExpression(Expression),
}

impl Predicate {
    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Predicate::Comparison { op, left, right }
    }

    /// Short name used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Comparison { .. } => "comparison",
            Predicate::Conjunction(_) => "conjunction",
            Predicate::Disjunction(_) => "disjunction",
            Predicate::Negation(_) => "negation",
            Predicate::IsNull(_) => "is_null",
            Predicate::IsNotNull(_) => "is_not_null",
            Predicate::In { .. } => "in",
            Predicate::Between { .. } => "between",
            Predicate::Like { .. } => "like",
            Predicate::BoolExpression(_) => "bool_expression",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_json_shape() {
        let predicate = Predicate::Conjunction(vec![
            Predicate::compare(
                ComparisonOp::Gt,
                Expression::column("age"),
                Expression::value(TypedValue::Int64(18)),
            ),
            Predicate::IsNotNull(Expression::column("name")),
        ]);

        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(json["conjunction"][0]["comparison"]["op"], "gt");
        assert_eq!(json["conjunction"][1]["is_not_null"]["column"], "name");

        let back: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, predicate);
    }

    #[test]
    fn test_date_literal_is_iso_string() {
        let value = TypedValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["date"], "2024-02-29");
    }

    #[test]
    fn test_kind_names() {
        let like = Predicate::Like {
            value: Expression::column("name"),
            pattern: "a%".into(),
        };
        assert_eq!(like.kind(), "like");
    }
}
