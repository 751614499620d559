//! Filter evaluation for in-memory documents.
//!
//! This module provides the matching engine behind `find`, `count_documents`, updates and
//! `$match` stages. Filters use the same document syntax a MongoDB server accepts; the
//! supported subset is implicit equality, dotted paths, the comparison operators
//! (`$eq $ne $gt $gte $lt $lte $in $nin`), the element and array operators
//! (`$exists $all $size $elemMatch $not`) and the logical operators (`$and $or $nor`).

use std::cmp::Ordering;

use bson::{Bson, Document};

use docrepo_core::error::{DocumentStoreError, DocumentStoreResult};

/// Canonical BSON type ordering used when values of different types are compared.
pub(crate) fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Total order over BSON values: first by type rank, then by value.
pub(crate) fn compare(left: &Bson, right: &Bson) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::Document(a), Bson::Document(b)) => compare_documents(a, b),
        (Bson::Array(a), Bson::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| compare(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Bson::Binary(a), Bson::Binary(b)) => a.bytes.cmp(&b.bytes),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
        (Bson::Timestamp(a), Bson::Timestamp(b)) => (a.time, a.increment).cmp(&(b.time, b.increment)),
        _ => match (as_f64(left), as_f64(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn compare_documents(left: &Document, right: &Document) -> Ordering {
    left.iter()
        .zip(right.iter())
        .map(|((ka, va), (kb, vb))| compare(va, vb).then_with(|| ka.cmp(kb)))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| left.len().cmp(&right.len()))
}

/// Equality under BSON comparison rules, so `Int32(1)` equals `Double(1.0)`.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    type_rank(left) == type_rank(right) && compare(left, right) == Ordering::Equal
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => as_f64(other).map(|n| n != 0.0).unwrap_or(true),
    }
}

/// Resolves a dotted path. Numeric segments index into arrays.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Resolves a dotted path the way a query does: a named segment that reaches an array continues
/// into every document element, so one path can yield several values.
pub(crate) fn path_values<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();

    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = document.get(*first) {
            collect_path(value, rest, &mut found);
        }
    }

    found
}

fn collect_path<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((segment, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(inner) => {
            if let Some(next) = inner.get(*segment) {
                collect_path(next, rest, found);
            }
        }
        Bson::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = items.get(index) {
                    collect_path(next, rest, found);
                }
            }
            Err(_) => {
                for item in items {
                    if let Some(next) = item.as_document().and_then(|inner| inner.get(*segment)) {
                        collect_path(next, rest, found);
                    }
                }
            }
        },
        _ => {}
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(inner) if inner.keys().next().is_some_and(|k| k.starts_with('$')) => Some(inner),
        _ => None,
    }
}

/// Matches a field value (or its absence) against a literal, including array membership.
fn equals_or_contains(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) => {
            values_equal(&Bson::Array(items.clone()), target)
                || items.iter().any(|item| values_equal(item, target))
        }
        Some(v) => values_equal(v, target),
    }
}

fn compare_with(value: Option<&Bson>, target: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let check = |candidate: &Bson| {
        type_rank(candidate) == type_rank(target) && accept(compare(candidate, target))
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check) || check(&Bson::Array(items.clone())),
        Some(v) => check(v),
    }
}

fn expect_array<'a>(op: &str, arg: &'a Bson) -> DocumentStoreResult<&'a Vec<Bson>> {
    arg.as_array()
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("{op} needs an array")))
}

fn apply_operator(value: Option<&Bson>, op: &str, arg: &Bson) -> DocumentStoreResult<bool> {
    Ok(match op {
        "$eq" => equals_or_contains(value, arg),
        "$gt" => compare_with(value, arg, |o| o == Ordering::Greater),
        "$gte" => compare_with(value, arg, |o| o != Ordering::Less),
        "$lt" => compare_with(value, arg, |o| o == Ordering::Less),
        "$lte" => compare_with(value, arg, |o| o != Ordering::Greater),
        "$in" => expect_array(op, arg)?
            .iter()
            .any(|candidate| equals_or_contains(value, candidate)),
        "$all" => match value {
            Some(Bson::Array(items)) => expect_array(op, arg)?
                .iter()
                .all(|wanted| items.iter().any(|item| values_equal(item, wanted))),
            _ => false,
        },
        "$size" => match (value, as_f64(arg)) {
            (Some(Bson::Array(items)), Some(size)) => items.len() as f64 == size,
            (_, None) => return Err(DocumentStoreError::InvalidDocument("$size needs a number".into())),
            _ => false,
        },
        "$elemMatch" => match (value, arg) {
            (Some(Bson::Array(items)), Bson::Document(condition)) => {
                let mut found = false;
                for item in items {
                    let hit = match item {
                        Bson::Document(inner) if is_operator_document(arg).is_none() => {
                            matches(inner, condition)?
                        }
                        other => matches_field(Some(other), arg)?,
                    };
                    if hit {
                        found = true;
                        break;
                    }
                }
                found
            }
            _ => false,
        },
        other => return Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
    })
}

/// Applies one operator to every value a path resolved to. Positive operators need a single
/// matching value; their negations need none.
fn apply_to_values(values: &[&Bson], op: &str, arg: &Bson) -> DocumentStoreResult<bool> {
    match op {
        "$ne" => Ok(!apply_to_values(values, "$eq", arg)?),
        "$nin" => Ok(!apply_to_values(values, "$in", arg)?),
        "$not" => match arg {
            Bson::Document(_) => Ok(!matches_values(values, arg)?),
            _ => Err(DocumentStoreError::InvalidDocument("$not needs an operator document".into())),
        },
        "$exists" => Ok(!values.is_empty() == truthy(arg)),
        _ if values.is_empty() => apply_operator(None, op, arg),
        _ => {
            for value in values {
                if apply_operator(Some(*value), op, arg)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn matches_values(values: &[&Bson], condition: &Bson) -> DocumentStoreResult<bool> {
    match is_operator_document(condition) {
        Some(operators) => {
            for (op, arg) in operators {
                if !apply_to_values(values, op, arg)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        None if values.is_empty() => Ok(equals_or_contains(None, condition)),
        None => Ok(values.iter().any(|value| equals_or_contains(Some(*value), condition))),
    }
}

/// Matches one field against a condition: either a literal or an operator document.
pub(crate) fn matches_field(value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
    let values: Vec<&Bson> = value.into_iter().collect();
    matches_values(&values, condition)
}

fn subfilters<'a>(op: &str, arg: &'a Bson) -> DocumentStoreResult<Vec<&'a Document>> {
    expect_array(op, arg)?
        .iter()
        .map(|item| {
            item.as_document().ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("{op} entries must be documents"))
            })
        })
        .collect()
}

/// Returns whether `document` satisfies `filter`. An empty filter matches everything.
pub(crate) fn matches(document: &Document, filter: &Document) -> DocumentStoreResult<bool> {
    for (key, condition) in filter {
        let hit = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in subfilters(key, condition)? {
                    if !matches(document, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in subfilters(key, condition)? {
                    if matches(document, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for sub in subfilters(key, condition)? {
                    if matches(document, sub)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(DocumentStoreError::UnsupportedOperator(op.to_string()));
            }
            path => matches_values(&path_values(document, path), condition)?,
        };

        if !hit {
            return Ok(false);
        }
    }

    Ok(true)
}
