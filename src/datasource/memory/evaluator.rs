//! Predicate evaluation over catalog rows
//!
//! SQL three-valued logic: `None` is UNKNOWN. A row is kept only when the
//! filter evaluates to `Some(true)`.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;

use super::catalog::Table;
use crate::api::{ComparisonOp, ConnectorError, ConnectorResult, Expression, Predicate, TypedValue};
use crate::datasource::filtering::PredicateSupport;
use crate::paging::NativeValue;

/// Predicates the memory backend evaluates: everything over existing columns
/// and literals, except arithmetic.
pub struct MemoryPredicateSupport<'a> {
    table: &'a Table,
}

impl<'a> MemoryPredicateSupport<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    fn supports_expression(&self, expression: &Expression) -> bool {
        match expression {
            Expression::Column(name) => self.table.position(name).is_some(),
            Expression::Value(_) => true,
            Expression::Arithmetic { .. } => false,
        }
    }
}

impl PredicateSupport for MemoryPredicateSupport<'_> {
    fn supports(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Comparison { left, right, .. } => {
                self.supports_expression(left) && self.supports_expression(right)
            }
            Predicate::Conjunction(operands) | Predicate::Disjunction(operands) => {
                operands.iter().all(|p| self.supports(p))
            }
            Predicate::Negation(inner) => self.supports(inner),
            Predicate::IsNull(e) | Predicate::IsNotNull(e) | Predicate::BoolExpression(e) => {
                self.supports_expression(e)
            }
            Predicate::In { value, set } => {
                self.supports_expression(value) && set.iter().all(|e| self.supports_expression(e))
            }
            Predicate::Between {
                value,
                least,
                greatest,
            } => {
                self.supports_expression(value)
                    && self.supports_expression(least)
                    && self.supports_expression(greatest)
            }
            Predicate::Like { value, .. } => self.supports_expression(value),
        }
    }
}

/// Translates a LIKE pattern into an anchored regex
fn like_regex(pattern: &str) -> ConnectorResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| ConnectorError::invalid_request(format!("LIKE pattern: {}", e)))
}

fn collect_patterns(predicate: &Predicate, patterns: &mut HashMap<String, Regex>) -> ConnectorResult<()> {
    match predicate {
        Predicate::Like { pattern, .. } => {
            if !patterns.contains_key(pattern) {
                patterns.insert(pattern.clone(), like_regex(pattern)?);
            }
        }
        Predicate::Conjunction(operands) | Predicate::Disjunction(operands) => {
            for operand in operands {
                collect_patterns(operand, patterns)?;
            }
        }
        Predicate::Negation(inner) => collect_patterns(inner, patterns)?,
        _ => {}
    }
    Ok(())
}

fn native_to_typed(value: &NativeValue) -> TypedValue {
    match value {
        NativeValue::Null => TypedValue::Null,
        NativeValue::Bool(b) => TypedValue::Bool(*b),
        NativeValue::Int8(v) => TypedValue::Int64(i64::from(*v)),
        NativeValue::Int16(v) => TypedValue::Int64(i64::from(*v)),
        NativeValue::Int32(v) => TypedValue::Int64(i64::from(*v)),
        NativeValue::Int64(v) => TypedValue::Int64(*v),
        NativeValue::Uint8(v) => TypedValue::Int64(i64::from(*v)),
        NativeValue::Uint16(v) => TypedValue::Int64(i64::from(*v)),
        NativeValue::Uint32(v) => TypedValue::Int64(i64::from(*v)),
        NativeValue::Uint64(v) => match i64::try_from(*v) {
            Ok(n) => TypedValue::Int64(n),
            Err(_) => TypedValue::Double(*v as f64),
        },
        NativeValue::Float(f) => TypedValue::Double(f64::from(*f)),
        NativeValue::Double(d) => TypedValue::Double(*d),
        NativeValue::Text(s) => TypedValue::Text(s.clone()),
        NativeValue::Bytes(b) => TypedValue::Text(String::from_utf8_lossy(b).into_owned()),
        NativeValue::Date(d) => TypedValue::Date(*d),
        NativeValue::Datetime(d) => TypedValue::Timestamp(Utc.from_utc_datetime(d)),
        NativeValue::Timestamp(t) => TypedValue::Timestamp(*t),
        NativeValue::Decimal(d) => TypedValue::Double(d.to_string().parse().unwrap_or(f64::NAN)),
    }
}

fn midnight(date: &NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

/// Orders two non-null values; `None` when incomparable (NaN)
fn compare_values(left: &TypedValue, right: &TypedValue) -> ConnectorResult<Option<Ordering>> {
    use TypedValue as V;
    Ok(match (left, right) {
        (V::Bool(a), V::Bool(b)) => Some(a.cmp(b)),
        (V::Int64(a), V::Int64(b)) => Some(a.cmp(b)),
        (V::Int64(a), V::Double(b)) => (*a as f64).partial_cmp(b),
        (V::Double(a), V::Int64(b)) => a.partial_cmp(&(*b as f64)),
        (V::Double(a), V::Double(b)) => a.partial_cmp(b),
        (V::Text(a), V::Text(b)) => Some(a.cmp(b)),
        (V::Date(a), V::Date(b)) => Some(a.cmp(b)),
        (V::Timestamp(a), V::Timestamp(b)) => Some(a.cmp(b)),
        (V::Date(a), V::Timestamp(b)) => midnight(a).map(|a| a.cmp(b)),
        (V::Timestamp(a), V::Date(b)) => midnight(b).map(|b| a.cmp(&b)),
        (a, b) => {
            return Err(ConnectorError::DataTypeMismatch(format!(
                "cannot compare {:?} with {:?}",
                a, b
            )))
        }
    })
}

fn and(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for value in values {
        match value {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown {
        None
    } else {
        Some(true)
    }
}

fn or(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for value in values {
        match value {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown {
        None
    } else {
        Some(false)
    }
}

/// A filter prepared for one table
pub struct PredicateEvaluator<'a> {
    table: &'a Table,
    predicate: Predicate,
    patterns: HashMap<String, Regex>,
}

impl<'a> PredicateEvaluator<'a> {
    pub fn new(table: &'a Table, predicate: Predicate) -> ConnectorResult<Self> {
        let mut patterns = HashMap::new();
        collect_patterns(&predicate, &mut patterns)?;
        Ok(Self {
            table,
            predicate,
            patterns,
        })
    }

    /// Whether `row` passes the filter
    pub fn matches(&self, row: &[NativeValue]) -> ConnectorResult<bool> {
        Ok(self.evaluate(&self.predicate, row)? == Some(true))
    }

    fn expression(&self, expression: &Expression, row: &[NativeValue]) -> ConnectorResult<TypedValue> {
        match expression {
            Expression::Column(name) => {
                let index = self.table.position(name).ok_or_else(|| {
                    ConnectorError::invalid_request(format!("unknown column {}", name))
                })?;
                Ok(native_to_typed(&row[index]))
            }
            Expression::Value(value) => Ok(value.clone()),
            Expression::Arithmetic { .. } => Err(ConnectorError::UnsupportedPredicate(
                "arithmetic expression".to_string(),
            )),
        }
    }

    fn compare(
        &self,
        op: ComparisonOp,
        left: &TypedValue,
        right: &TypedValue,
    ) -> ConnectorResult<Option<bool>> {
        if matches!(left, TypedValue::Null) || matches!(right, TypedValue::Null) {
            return Ok(None);
        }
        let ordering = match compare_values(left, right)? {
            Some(ordering) => ordering,
            None => return Ok(None),
        };
        Ok(Some(match op {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::Ne => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::Le => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::Ge => ordering != Ordering::Less,
        }))
    }

    fn evaluate(&self, predicate: &Predicate, row: &[NativeValue]) -> ConnectorResult<Option<bool>> {
        match predicate {
            Predicate::Comparison { op, left, right } => {
                let left = self.expression(left, row)?;
                let right = self.expression(right, row)?;
                self.compare(*op, &left, &right)
            }
            Predicate::Conjunction(operands) => {
                let values = operands
                    .iter()
                    .map(|p| self.evaluate(p, row))
                    .collect::<ConnectorResult<Vec<_>>>()?;
                Ok(and(values.into_iter()))
            }
            Predicate::Disjunction(operands) => {
                let values = operands
                    .iter()
                    .map(|p| self.evaluate(p, row))
                    .collect::<ConnectorResult<Vec<_>>>()?;
                Ok(or(values.into_iter()))
            }
            Predicate::Negation(inner) => Ok(self.evaluate(inner, row)?.map(|b| !b)),
            Predicate::IsNull(e) => Ok(Some(matches!(self.expression(e, row)?, TypedValue::Null))),
            Predicate::IsNotNull(e) => {
                Ok(Some(!matches!(self.expression(e, row)?, TypedValue::Null)))
            }
            Predicate::In { value, set } => {
                let value = self.expression(value, row)?;
                let mut results = Vec::with_capacity(set.len());
                for candidate in set {
                    let candidate = self.expression(candidate, row)?;
                    results.push(self.compare(ComparisonOp::Eq, &value, &candidate)?);
                }
                Ok(or(results.into_iter()))
            }
            Predicate::Between {
                value,
                least,
                greatest,
            } => {
                let value = self.expression(value, row)?;
                let least = self.expression(least, row)?;
                let greatest = self.expression(greatest, row)?;
                let lower = self.compare(ComparisonOp::Ge, &value, &least)?;
                let upper = self.compare(ComparisonOp::Le, &value, &greatest)?;
                Ok(and([lower, upper].into_iter()))
            }
            Predicate::Like { value, pattern } => match self.expression(value, row)? {
                TypedValue::Null => Ok(None),
                TypedValue::Text(text) => {
                    let regex = self.patterns.get(pattern).ok_or_else(|| {
                        ConnectorError::invariant(format!("LIKE pattern {} not prepared", pattern))
                    })?;
                    Ok(Some(regex.is_match(&text)))
                }
                other => Err(ConnectorError::DataTypeMismatch(format!(
                    "LIKE over non-text value {:?}",
                    other
                ))),
            },
            Predicate::BoolExpression(e) => match self.expression(e, row)? {
                TypedValue::Null => Ok(None),
                TypedValue::Bool(b) => Ok(Some(b)),
                other => Err(ConnectorError::DataTypeMismatch(format!(
                    "{:?} is not a boolean",
                    other
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ArithmeticOp;
    use crate::datasource::memory::catalog::{CatalogColumn, NativeType};

    fn table() -> Table {
        Table::new(
            "people",
            vec![
                CatalogColumn::new("id", NativeType::Int32),
                CatalogColumn::new("name", NativeType::Text).nullable(),
                CatalogColumn::new("active", NativeType::Bool).nullable(),
            ],
        )
    }

    fn row(id: i32, name: Option<&str>, active: Option<bool>) -> Vec<NativeValue> {
        vec![
            NativeValue::Int32(id),
            name.map(|n| NativeValue::Text(n.into())).unwrap_or_default(),
            active.map(NativeValue::Bool).unwrap_or_default(),
        ]
    }

    fn col(name: &str) -> Expression {
        Expression::column(name)
    }

    fn int(n: i64) -> Expression {
        Expression::value(TypedValue::Int64(n))
    }

    fn matches(table: &Table, predicate: Predicate, row: &[NativeValue]) -> bool {
        PredicateEvaluator::new(table, predicate)
            .unwrap()
            .matches(row)
            .unwrap()
    }

    #[test]
    fn test_comparisons() {
        let t = table();
        let r = row(5, Some("eve"), None);
        assert!(matches(&t, Predicate::compare(ComparisonOp::Ge, col("id"), int(5)), &r));
        assert!(!matches(&t, Predicate::compare(ComparisonOp::Lt, col("id"), int(5)), &r));
        assert!(matches(
            &t,
            Predicate::compare(
                ComparisonOp::Eq,
                col("name"),
                Expression::value(TypedValue::Text("eve".into()))
            ),
            &r
        ));
    }

    #[test]
    fn test_null_is_unknown() {
        let t = table();
        let r = row(1, None, None);
        let eq = Predicate::compare(
            ComparisonOp::Eq,
            col("name"),
            Expression::value(TypedValue::Text("x".into())),
        );
        assert!(!matches(&t, eq.clone(), &r));
        assert!(!matches(&t, Predicate::Negation(Box::new(eq.clone())), &r));
        // UNKNOWN OR TRUE is TRUE
        let either = Predicate::Disjunction(vec![eq, Predicate::IsNull(col("name"))]);
        assert!(matches(&t, either, &r));
    }

    #[test]
    fn test_in_and_between() {
        let t = table();
        let r = row(3, Some("bob"), Some(true));
        assert!(matches(
            &t,
            Predicate::In {
                value: col("id"),
                set: vec![int(1), int(3)],
            },
            &r
        ));
        assert!(matches(
            &t,
            Predicate::Between {
                value: col("id"),
                least: int(3),
                greatest: int(4),
            },
            &r
        ));
        assert!(!matches(
            &t,
            Predicate::Between {
                value: col("id"),
                least: int(4),
                greatest: int(9),
            },
            &r
        ));
    }

    #[test]
    fn test_like() {
        let t = table();
        let like = |pattern: &str| Predicate::Like {
            value: col("name"),
            pattern: pattern.into(),
        };
        let r = row(1, Some("a.b_c"), None);
        assert!(matches(&t, like("a%"), &r));
        assert!(matches(&t, like("a.b_c"), &r));
        assert!(matches(&t, like("_._%"), &r));
        assert!(!matches(&t, like("b%"), &r));
        assert!(!matches(&t, like("a.b"), &r));
        assert!(!matches(&t, like("%"), &row(1, None, None)));
    }

    #[test]
    fn test_bool_expression() {
        let t = table();
        let p = Predicate::BoolExpression(col("active"));
        assert!(matches(&t, p.clone(), &row(1, None, Some(true))));
        assert!(!matches(&t, p.clone(), &row(1, None, Some(false))));
        assert!(!matches(&t, p, &row(1, None, None)));
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let t = table();
        let evaluator = PredicateEvaluator::new(
            &t,
            Predicate::compare(ComparisonOp::Eq, col("id"), Expression::value(TypedValue::Text("1".into()))),
        )
        .unwrap();
        assert!(matches!(
            evaluator.matches(&row(1, None, None)),
            Err(ConnectorError::DataTypeMismatch(_))
        ));
    }

    #[test]
    fn test_support() {
        let t = table();
        let support = MemoryPredicateSupport::new(&t);
        assert!(support.supports(&Predicate::IsNull(col("name"))));
        assert!(!support.supports(&Predicate::IsNull(col("missing"))));
        let arithmetic = Predicate::compare(
            ComparisonOp::Gt,
            Expression::Arithmetic {
                op: ArithmeticOp::Add,
                left: Box::new(col("id")),
                right: Box::new(int(1)),
            },
            int(3),
        );
        assert!(!support.supports(&arithmetic));
        assert!(!support.supports(&Predicate::Conjunction(vec![
            Predicate::IsNull(col("name")),
            arithmetic
        ])));
    }
}
