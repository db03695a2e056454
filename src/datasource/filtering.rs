//! Predicate pushdown policy
//!
//! A backend declares what it can evaluate through `PredicateSupport`.
//! `plan_pushdown` combines that with the caller's `Filtering` mode:
//!
//! - `Mandatory`: anything unsupported fails the read before a row is scanned
//! - `Optional` (and `Unspecified`): unsupported parts are dropped and the
//!   caller filters the extra rows itself; a top-level conjunction keeps its
//!   supported operands

use crate::api::{ConnectorError, ConnectorResult, Filtering, Predicate};
use crate::context::RequestContext;
use crate::observability::{Event, Logger};

/// What a backend can evaluate natively
pub trait PredicateSupport: Send + Sync {
    /// Whether `predicate` can be evaluated in full, operands included
    fn supports(&self, predicate: &Predicate) -> bool;
}

/// Backends or configurations without pushdown
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPushdown;

impl PredicateSupport for NoPushdown {
    fn supports(&self, _predicate: &Predicate) -> bool {
        false
    }
}

/// Outcome of pushdown planning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushdownPlan {
    /// The filter the backend must apply
    pub predicate: Option<Predicate>,
    /// Kinds of the predicates left for the caller
    pub dropped: Vec<&'static str>,
}

impl PushdownPlan {
    pub fn is_lossless(&self) -> bool {
        self.dropped.is_empty()
    }
}

pub fn plan_pushdown(
    ctx: &RequestContext,
    filter: Option<&Predicate>,
    filtering: Filtering,
    support: &dyn PredicateSupport,
) -> ConnectorResult<PushdownPlan> {
    let predicate = match filter {
        None => return Ok(PushdownPlan::default()),
        Some(predicate) => predicate,
    };

    if support.supports(predicate) {
        return Ok(PushdownPlan {
            predicate: Some(predicate.clone()),
            dropped: Vec::new(),
        });
    }

    if filtering.is_mandatory() {
        let unsupported = first_unsupported(predicate, support);
        let mut fields = ctx.log_fields();
        fields.push(("predicate", unsupported));
        Logger::warn(Event::PushdownRejected.as_str(), &fields);
        return Err(ConnectorError::UnsupportedPredicate(unsupported.to_string()));
    }

    let plan = match predicate {
        Predicate::Conjunction(operands) => {
            let (kept, dropped): (Vec<&Predicate>, Vec<&Predicate>) =
                operands.iter().partition(|p| support.supports(p));
            let predicate = match kept.len() {
                0 => None,
                1 => Some(kept[0].clone()),
                _ => Some(Predicate::Conjunction(kept.into_iter().cloned().collect())),
            };
            PushdownPlan {
                predicate,
                dropped: dropped.iter().map(|p| p.kind()).collect(),
            }
        }
        other => PushdownPlan {
            predicate: None,
            dropped: vec![other.kind()],
        },
    };

    for kind in &plan.dropped {
        let mut fields = ctx.log_fields();
        fields.push(("predicate", *kind));
        Logger::warn(Event::PushdownDropped.as_str(), &fields);
    }

    Ok(plan)
}

/// Innermost unsupported node, for a precise error message
fn first_unsupported(predicate: &Predicate, support: &dyn PredicateSupport) -> &'static str {
    let children: &[Predicate] = match predicate {
        Predicate::Conjunction(operands) | Predicate::Disjunction(operands) => operands,
        Predicate::Negation(inner) => std::slice::from_ref(inner.as_ref()),
        _ => &[],
    };
    children
        .iter()
        .find(|child| !support.supports(child))
        .map(|child| first_unsupported(child, support))
        .unwrap_or_else(|| predicate.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ComparisonOp, Expression, TypedValue};

    /// Supports comparisons and IS NULL, and any boolean combination of them
    struct ComparisonsOnly;

    impl PredicateSupport for ComparisonsOnly {
        fn supports(&self, predicate: &Predicate) -> bool {
            match predicate {
                Predicate::Comparison { .. } | Predicate::IsNull(_) => true,
                Predicate::Conjunction(ps) | Predicate::Disjunction(ps) => {
                    ps.iter().all(|p| self.supports(p))
                }
                Predicate::Negation(inner) => self.supports(inner),
                _ => false,
            }
        }
    }

    fn gt(column: &str, n: i64) -> Predicate {
        Predicate::compare(
            ComparisonOp::Gt,
            Expression::column(column),
            Expression::value(TypedValue::Int64(n)),
        )
    }

    fn like() -> Predicate {
        Predicate::Like {
            value: Expression::column("name"),
            pattern: "a%".into(),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("read_splits")
    }

    #[test]
    fn test_no_filter() {
        let plan = plan_pushdown(&ctx(), None, Filtering::Mandatory, &NoPushdown).unwrap();
        assert_eq!(plan, PushdownPlan::default());
    }

    #[test]
    fn test_supported_filter_pushed_whole() {
        let filter = Predicate::Conjunction(vec![gt("a", 1), gt("b", 2)]);
        let plan =
            plan_pushdown(&ctx(), Some(&filter), Filtering::Mandatory, &ComparisonsOnly).unwrap();
        assert_eq!(plan.predicate, Some(filter));
        assert!(plan.is_lossless());
    }

    #[test]
    fn test_mandatory_rejects_unsupported() {
        let filter = Predicate::Disjunction(vec![gt("a", 1), like()]);
        let err = plan_pushdown(&ctx(), Some(&filter), Filtering::Mandatory, &ComparisonsOnly)
            .unwrap_err();
        match err {
            ConnectorError::UnsupportedPredicate(kind) => assert_eq!(kind, "like"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_optional_drops_unsupported() {
        let filter = like();
        let plan =
            plan_pushdown(&ctx(), Some(&filter), Filtering::Optional, &ComparisonsOnly).unwrap();
        assert_eq!(plan.predicate, None);
        assert_eq!(plan.dropped, vec!["like"]);
    }

    #[test]
    fn test_optional_conjunction_keeps_supported_operands() {
        let filter = Predicate::Conjunction(vec![gt("a", 1), like(), gt("b", 2)]);
        let plan =
            plan_pushdown(&ctx(), Some(&filter), Filtering::Unspecified, &ComparisonsOnly)
                .unwrap();
        assert_eq!(
            plan.predicate,
            Some(Predicate::Conjunction(vec![gt("a", 1), gt("b", 2)]))
        );
        assert_eq!(plan.dropped, vec!["like"]);
    }

    #[test]
    fn test_optional_conjunction_single_survivor_unwrapped() {
        let filter = Predicate::Conjunction(vec![like(), gt("a", 1)]);
        let plan =
            plan_pushdown(&ctx(), Some(&filter), Filtering::Optional, &ComparisonsOnly).unwrap();
        assert_eq!(plan.predicate, Some(gt("a", 1)));
    }

    #[test]
    fn test_optional_disjunction_dropped_whole() {
        let filter = Predicate::Disjunction(vec![gt("a", 1), like()]);
        let plan =
            plan_pushdown(&ctx(), Some(&filter), Filtering::Optional, &ComparisonsOnly).unwrap();
        assert_eq!(plan.predicate, None);
        assert_eq!(plan.dropped, vec!["disjunction"]);
    }

    #[test]
    fn test_disabled_pushdown_under_mandatory() {
        let filter = gt("a", 1);
        let result = plan_pushdown(&ctx(), Some(&filter), Filtering::Mandatory, &NoPushdown);
        assert!(matches!(result, Err(ConnectorError::UnsupportedPredicate(_))));
    }
}
