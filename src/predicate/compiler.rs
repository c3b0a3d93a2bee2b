use bytes::Bytes;

use crate::collab::authorizer::{is_open, Authorizer};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{is_reserved_key, SeriesId};
use crate::index::series_id_set::SeriesIdSet;
use crate::metric::metric::Metric;
use crate::predicate::expr::{Expr, Op};

/// Any part of `expr` this crate could not resolve against a metric's tag
/// index (a field comparison, most commonly) is returned as a residual for
/// the caller to evaluate itself rather than silently dropped.
pub type ResidualFilters = Option<Expr>;

fn literal_bytes(expr: &Expr) -> Result<&Bytes> {
    match expr {
        Expr::StringLiteral { v } => Ok(v),
        _ => Err(unsupported()),
    }
}

fn regex_of(expr: &Expr) -> Result<&regex::bytes::Regex> {
    match expr {
        Expr::RegexLiteral { v } => Ok(v),
        _ => Err(unsupported()),
    }
}

fn unsupported() -> Error {
    Error::new(ErrorKind::UnsupportedPredicate, "right-hand side is not a literal or regex")
}

fn combine_residual(op: Op, lhs: ResidualFilters, rhs: ResidualFilters) -> ResidualFilters {
    match (lhs, rhs) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(Expr::binary(op, a, b)),
    }
}

fn tag_filter_series(metric: &Metric, key: &[u8], op: Op, rhs: &Expr) -> Result<SeriesIdSet> {
    match op {
        Op::Eq => Ok(metric.series_ids_by_tag_value(key, literal_bytes(rhs)?)),
        Op::Neq => {
            let all = metric.series_ids_all();
            let matched = metric.series_ids_by_tag_value(key, literal_bytes(rhs)?);
            all.difference(&matched);
            Ok(all)
        }
        Op::EqRegex => {
            let set = SeriesIdSet::new();
            let re = regex_of(rhs)?;
            for v in metric.tag_values(key) {
                if re.is_match(&v) {
                    set.union(&metric.series_ids_by_tag_value(key, &v));
                }
            }
            Ok(set)
        }
        Op::NeqRegex => {
            let all = metric.series_ids_all();
            let re = regex_of(rhs)?;
            for v in metric.tag_values(key) {
                if re.is_match(&v) {
                    all.difference(&metric.series_ids_by_tag_value(key, &v));
                }
            }
            Ok(all)
        }
        Op::And | Op::Or => Err(unsupported()),
    }
}

/// Walks `expr` against `metric`'s tag index, returning the matching
/// authorized series and any residual (non-tag) predicate the caller must
/// still evaluate itself.
pub fn walk_where_for_series_ids(
    metric: &Metric,
    expr: &Expr,
    db: &str,
    auth: Option<&dyn Authorizer>,
) -> Result<(SeriesIdSet, ResidualFilters)> {
    match expr {
        Expr::Paren { inner } => walk_where_for_series_ids(metric, inner, db, auth),

        Expr::Binary { op: Op::And, lhs, rhs } => {
            let (lset, lresid) = walk_where_for_series_ids(metric, lhs, db, auth)?;
            let (rset, rresid) = walk_where_for_series_ids(metric, rhs, db, auth)?;
            lset.intersect(&rset);
            Ok((lset, combine_residual(Op::And, lresid, rresid)))
        }

        Expr::Binary { op: Op::Or, lhs, rhs } => {
            let (lset, lresid) = walk_where_for_series_ids(metric, lhs, db, auth)?;
            let (rset, rresid) = walk_where_for_series_ids(metric, rhs, db, auth)?;
            lset.union(&rset);
            Ok((lset, combine_residual(Op::Or, lresid, rresid)))
        }

        Expr::Binary { op, lhs, rhs } => {
            let Expr::VarRef { name } = lhs.as_ref() else {
                // Not a tag comparison: a field predicate we cannot evaluate
                // ourselves. Every series is a candidate until the caller
                // resolves the residual.
                return Ok((metric.series_ids_all(), Some(expr.clone())));
            };

            if name.as_ref() == crate::core::types::RESERVED_METRIC_KEY {
                let name_matches = match op {
                    Op::Eq => literal_bytes(rhs)?.as_ref() == metric.name.as_ref(),
                    Op::Neq => literal_bytes(rhs)?.as_ref() != metric.name.as_ref(),
                    Op::EqRegex => regex_of(rhs)?.is_match(&metric.name),
                    Op::NeqRegex => !regex_of(rhs)?.is_match(&metric.name),
                    Op::And | Op::Or => return Err(unsupported()),
                };
                let set = SeriesIdSet::new();
                if name_matches {
                    for id in metric.series_ids_all().iter() {
                        if metric.authorized(SeriesId(id), db, auth) {
                            set.add(id);
                        }
                    }
                }
                return Ok((set, None));
            }

            // Any other reserved (`_`-prefixed) key is a system tag we do
            // not index; it matches nothing rather than erroring or
            // falling through to `metric.name`.
            if is_reserved_key(name) {
                return Ok((SeriesIdSet::new(), None));
            }

            let candidates = tag_filter_series(metric, name, *op, rhs)?;
            let authorized = SeriesIdSet::new();
            for id in candidates.iter() {
                if metric.authorized(SeriesId(id), db, auth) {
                    authorized.add(id);
                }
            }
            Ok((authorized, None))
        }

        _ => Err(unsupported()),
    }
}

/// `_name` filters select/reject metrics by name against a literal or
/// regex; all other bare predicates fall through to `metric_names_by_tag_filters`.
fn metric_names_by_name_filter(metrics: &[&Metric], op: Op, rhs: &Expr) -> Result<Vec<Bytes>> {
    let mut names = Vec::new();
    for m in metrics {
        let keep = match op {
            Op::Eq => literal_bytes(rhs)?.as_ref() == m.name.as_ref(),
            Op::Neq => literal_bytes(rhs)?.as_ref() != m.name.as_ref(),
            Op::EqRegex => regex_of(rhs)?.is_match(&m.name),
            Op::NeqRegex => !regex_of(rhs)?.is_match(&m.name),
            Op::And | Op::Or => return Err(unsupported()),
        };
        if keep {
            names.push(m.name.clone());
        }
    }
    Ok(names)
}

/// Per-metric truth table for a single tag-key predicate, mirroring the
/// negation/authorization interaction: a metric qualifies when it has a
/// tag value matching the predicate (for `=`/`=~`) or lacks one (for
/// `!=`/`!~`), AND at least one series behind that match is authorized.
/// For `!=`/`!~` when no value was found at all, qualification falls back
/// to "does this metric have any authorized series at all".
fn metric_names_by_tag_filters(
    metrics: &[&Metric],
    key: &[u8],
    op: Op,
    rhs: &Expr,
    db: &str,
    auth: Option<&dyn Authorizer>,
) -> Result<Vec<Bytes>> {
    let mut names = Vec::new();
    'metrics: for m in metrics {
        if m.is_deleted() {
            continue;
        }
        let mut tag_match = false;
        let mut authorized = is_open(auth);
        let values = m.tag_values(key);

        for value in &values {
            let val_equal = match op {
                Op::Eq | Op::Neq => literal_bytes(rhs)?.as_ref() == value.as_ref(),
                Op::EqRegex | Op::NeqRegex => regex_of(rhs)?.is_match(value),
                Op::And | Op::Or => return Err(unsupported()),
            };
            if !val_equal {
                continue;
            }
            tag_match = true;
            if is_open(auth) {
                break;
            }
            let ids = m.series_ids_by_tag_value(key, value);
            let any_authorized = ids.iter().any(|id| m.authorized(SeriesId(id), db, auth));
            authorized = any_authorized;
            match op {
                Op::Eq | Op::Neq => break,
                Op::EqRegex | Op::NeqRegex => {
                    if any_authorized {
                        break;
                    }
                    // keep scanning other values for an authorized match
                }
                Op::And | Op::Or => unreachable!(),
            }
        }

        if matches!(op, Op::Neq | Op::NeqRegex) && !tag_match {
            authorized = m.series_ids_all().iter().any(|id| m.authorized(SeriesId(id), db, auth));
        }

        let included = (tag_match == matches!(op, Op::Eq | Op::EqRegex)) && authorized;
        if included {
            names.push(m.name.clone());
            continue 'metrics;
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

fn union_names(a: Vec<Bytes>, b: Vec<Bytes>) -> Vec<Bytes> {
    let mut out = a;
    out.extend(b);
    out.sort();
    out.dedup();
    out
}

fn intersect_names(a: Vec<Bytes>, b: Vec<Bytes>) -> Vec<Bytes> {
    let set: std::collections::HashSet<_> = b.into_iter().collect();
    let mut out: Vec<Bytes> = a.into_iter().filter(|n| set.contains(n)).collect();
    out.sort();
    out.dedup();
    out
}

/// Resolves which metric names satisfy `expr`, recursing through AND/OR and
/// dispatching `_name` filters and tag-key filters to their own rules.
pub fn metric_names_by_expr(
    metrics: &[&Metric],
    expr: &Expr,
    db: &str,
    auth: Option<&dyn Authorizer>,
) -> Result<Vec<Bytes>> {
    match expr {
        Expr::Paren { inner } => metric_names_by_expr(metrics, inner, db, auth),
        Expr::Binary { op: Op::And, lhs, rhs } => {
            let l = metric_names_by_expr(metrics, lhs, db, auth)?;
            let r = metric_names_by_expr(metrics, rhs, db, auth)?;
            Ok(intersect_names(l, r))
        }
        Expr::Binary { op: Op::Or, lhs, rhs } => {
            let l = metric_names_by_expr(metrics, lhs, db, auth)?;
            let r = metric_names_by_expr(metrics, rhs, db, auth)?;
            Ok(union_names(l, r))
        }
        Expr::Binary { op, lhs, rhs } => {
            let Expr::VarRef { name } = lhs.as_ref() else {
                return Err(unsupported());
            };
            if name.as_ref() == crate::core::types::RESERVED_METRIC_KEY {
                metric_names_by_name_filter(metrics, *op, rhs)
            } else if is_reserved_key(name) {
                Ok(Vec::new())
            } else {
                metric_names_by_tag_filters(metrics, name, *op, rhs, db, auth)
            }
        }
        _ => Err(unsupported()),
    }
}
