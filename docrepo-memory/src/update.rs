//! Update operator application for in-memory documents.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docrepo_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::UpdateModifications,
};

use crate::{
    evaluator::{compare, get_path, matches, matches_field, values_equal},
    pipeline,
};

/// Rejects update specifications the server would reject before touching any document.
pub(crate) fn validate(update: &UpdateModifications) -> DocumentStoreResult<()> {
    match update {
        UpdateModifications::Document(operators) => {
            if operators.is_empty() {
                return Err(DocumentStoreError::InvalidDocument(
                    "update document must not be empty".into(),
                ));
            }
            if let Some(key) = operators.keys().find(|k| !k.starts_with('$')) {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "update document requires atomic operators, found '{key}'"
                )));
            }
            Ok(())
        }
        UpdateModifications::Pipeline(stages) => pipeline::validate_update_stages(stages),
    }
}

/// Applies an update to `document`. `inserting` is set when the document is being created by
/// an upsert, which enables `$setOnInsert`.
pub(crate) fn apply(
    document: &mut Document,
    update: &UpdateModifications,
    inserting: bool,
) -> DocumentStoreResult<()> {
    let original_id = document.get("_id").cloned();

    match update {
        UpdateModifications::Document(operators) => {
            for (op, fields) in operators {
                let fields = fields.as_document().ok_or_else(|| {
                    DocumentStoreError::InvalidDocument(format!("{op} needs a document argument"))
                })?;
                for (path, value) in fields {
                    apply_operator(document, op, path, value, inserting)?;
                }
            }
        }
        UpdateModifications::Pipeline(stages) => {
            *document = pipeline::apply_update_stages(document.clone(), stages)?;
        }
    }

    match (original_id, document.get("_id")) {
        (Some(before), Some(after)) if !values_equal(&before, after) => Err(immutable_id()),
        (Some(_), None) => Err(immutable_id()),
        _ => Ok(()),
    }
}

fn immutable_id() -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(
        "performing an update on the path '_id' would modify the immutable field '_id'".into(),
    )
}

fn apply_operator(
    document: &mut Document,
    op: &str,
    path: &str,
    value: &Bson,
    inserting: bool,
) -> DocumentStoreResult<()> {
    match op {
        "$set" => set_path(document, path, value.clone()),
        "$setOnInsert" => {
            if inserting {
                set_path(document, path, value.clone())?;
            }
            Ok(())
        }
        "$unset" => {
            remove_path(document, path);
            Ok(())
        }
        "$inc" => {
            let next = match get_path(document, path) {
                None => numeric_add(&Bson::Int32(0), value),
                Some(current) => numeric_add(current, value),
            }
            .ok_or_else(|| non_numeric(op, path))?;
            set_path(document, path, next)
        }
        "$mul" => {
            let next = match get_path(document, path) {
                None => numeric_mul(&Bson::Int32(0), value),
                Some(current) => numeric_mul(current, value),
            }
            .ok_or_else(|| non_numeric(op, path))?;
            set_path(document, path, next)
        }
        "$min" | "$max" => {
            let wanted = if op == "$min" { Ordering::Less } else { Ordering::Greater };
            let replace = get_path(document, path)
                .map(|current| compare(value, current) == wanted)
                .unwrap_or(true);
            if replace {
                set_path(document, path, value.clone())?;
            }
            Ok(())
        }
        "$rename" => {
            let target = value.as_str().ok_or_else(|| {
                DocumentStoreError::InvalidDocument("$rename target must be a string".into())
            })?;
            if let Some(moved) = remove_path(document, path) {
                set_path(document, target, moved)?;
            }
            Ok(())
        }
        "$push" | "$addToSet" => {
            let values = match value {
                Bson::Document(modifier) if modifier.contains_key("$each") => modifier
                    .get_array("$each")
                    .map_err(|_| DocumentStoreError::InvalidDocument("$each needs an array".into()))?
                    .clone(),
                single => vec![single.clone()],
            };
            let mut items = match get_path(document, path) {
                None => Vec::new(),
                Some(Bson::Array(items)) => items.clone(),
                Some(_) => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "cannot apply {op} to non-array field '{path}'"
                    )));
                }
            };
            for item in values {
                if op == "$push" || !items.iter().any(|existing| values_equal(existing, &item)) {
                    items.push(item);
                }
            }
            set_path(document, path, Bson::Array(items))
        }
        "$pull" => {
            let Some(Bson::Array(items)) = get_path(document, path) else {
                return Ok(());
            };
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                let remove = match (item, value) {
                    (Bson::Document(inner), Bson::Document(condition))
                        if !condition.keys().any(|k| k.starts_with('$')) =>
                    {
                        matches(inner, condition)?
                    }
                    _ => matches_field(Some(item), value)?,
                };
                if !remove {
                    kept.push(item.clone());
                }
            }
            set_path(document, path, Bson::Array(kept))
        }
        other => Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
    }
}

fn non_numeric(op: &str, path: &str) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!(
        "cannot apply {op} to a value of non-numeric type at '{path}'"
    ))
}

fn numeric(
    left: &Bson,
    right: &Bson,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Option<Bson> {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => int(*a as i64, *b as i64).map(|n| {
            i32::try_from(n).map(Bson::Int32).unwrap_or(Bson::Int64(n))
        }),
        (Bson::Int32(a), Bson::Int64(b)) => int(*a as i64, *b).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int32(b)) => int(*a, *b as i64).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int64(b)) => int(*a, *b).map(Bson::Int64),
        (Bson::Double(a), Bson::Double(b)) => Some(Bson::Double(float(*a, *b))),
        (Bson::Double(a), Bson::Int32(b)) => Some(Bson::Double(float(*a, *b as f64))),
        (Bson::Double(a), Bson::Int64(b)) => Some(Bson::Double(float(*a, *b as f64))),
        (Bson::Int32(a), Bson::Double(b)) => Some(Bson::Double(float(*a as f64, *b))),
        (Bson::Int64(a), Bson::Double(b)) => Some(Bson::Double(float(*a as f64, *b))),
        _ => None,
    }
}

/// Adds two numbers, widening `Int32` to `Int64` on overflow.
pub(crate) fn numeric_add(left: &Bson, right: &Bson) -> Option<Bson> {
    numeric(left, right, i64::checked_add, |a, b| a + b)
}

pub(crate) fn numeric_mul(left: &Bson, right: &Bson) -> Option<Bson> {
    numeric(left, right, i64::checked_mul, |a, b| a * b)
}

/// Sets a dotted path, creating intermediate documents as needed. Numeric segments index into
/// arrays, padding with nulls past the end.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            set_in(child, head, rest, value)
        }
    }
}

fn set_in(target: &mut Bson, parent: &str, path: &str, value: Bson) -> DocumentStoreResult<()> {
    let cannot_create = || {
        DocumentStoreError::InvalidDocument(format!(
            "cannot create field '{path}' in non-document element '{parent}'"
        ))
    };

    match target {
        Bson::Document(inner) => set_path(inner, path, value),
        Bson::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let index = head.parse::<usize>().map_err(|_| cannot_create())?;
            if index >= items.len() {
                items.resize(index + 1, Bson::Null);
                if rest.is_some() {
                    items[index] = Bson::Document(Document::new());
                }
            }
            match rest {
                None => {
                    items[index] = value;
                    Ok(())
                }
                Some(rest) => set_in(&mut items[index], head, rest, value),
            }
        }
        _ => Err(cannot_create()),
    }
}

/// Removes a dotted path, returning the removed value. An array element is replaced by null
/// rather than shifting the array.
pub(crate) fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => remove_in(document.get_mut(head)?, rest),
    }
}

fn remove_in(target: &mut Bson, path: &str) -> Option<Bson> {
    match target {
        Bson::Document(inner) => remove_path(inner, path),
        Bson::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let slot = items.get_mut(head.parse::<usize>().ok()?)?;
            match rest {
                None => Some(std::mem::replace(slot, Bson::Null)),
                Some(rest) => remove_in(slot, rest),
            }
        }
        _ => None,
    }
}

/// Builds the base document of an upsert from the equality conditions in `filter`.
pub(crate) fn seed_from_filter(filter: &Document) -> DocumentStoreResult<Document> {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed)?;
    Ok(seed)
}

fn collect_equalities(filter: &Document, seed: &mut Document) -> DocumentStoreResult<()> {
    for (key, condition) in filter {
        if key == "$and" {
            for sub in condition.as_array().into_iter().flatten() {
                if let Bson::Document(sub) = sub {
                    collect_equalities(sub, seed)?;
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }

        match condition {
            Bson::Document(inner) if inner.keys().any(|k| k.starts_with('$')) => {
                if let Some(value) = inner.get("$eq") {
                    set_path(seed, key, value.clone())?;
                }
            }
            literal => set_path(seed, key, literal.clone())?,
        }
    }

    Ok(())
}
