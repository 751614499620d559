//! Aggregation stages, projections and sorting for in-memory documents.
//!
//! Supported stages: `$match`, `$project`, `$sort`, `$skip`, `$limit`, `$count`,
//! `$set`/`$addFields`, `$unset` and `$group` with the `$sum`, `$avg`, `$min`, `$max`,
//! `$first`, `$last`, `$push` and `$count` accumulators. Expressions are limited to field
//! references (`"$path"`), `$literal` and literal values.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docrepo_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::{
    evaluator::{as_f64, compare, get_path, matches, truthy, values_equal},
    update::{numeric_add, remove_path, set_path},
};

/// Stages allowed inside an update pipeline.
const UPDATE_STAGES: &[&str] = &["$set", "$addFields", "$unset", "$project"];

fn single_stage(stage: &Document) -> DocumentStoreResult<(&str, &Bson)> {
    let mut entries = stage.iter();
    match (entries.next(), entries.next()) {
        (Some((name, body)), None) => Ok((name.as_str(), body)),
        _ => Err(DocumentStoreError::InvalidDocument(
            "a pipeline stage must contain exactly one field".into(),
        )),
    }
}

fn stage_document<'a>(name: &str, body: &'a Bson) -> DocumentStoreResult<&'a Document> {
    body.as_document()
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("{name} needs a document")))
}

fn stage_count(name: &str, body: &Bson) -> DocumentStoreResult<usize> {
    match as_f64(body) {
        Some(n) if n >= 0.0 => Ok(n as usize),
        _ => Err(DocumentStoreError::InvalidDocument(format!(
            "{name} needs a non-negative number"
        ))),
    }
}

/// Runs `stages` over `documents` in order.
pub(crate) fn run(mut documents: Vec<Document>, stages: &[Document]) -> DocumentStoreResult<Vec<Document>> {
    for stage in stages {
        let (name, body) = single_stage(stage)?;

        documents = match name {
            "$match" => {
                let filter = stage_document(name, body)?;
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if matches(&document, filter)? {
                        kept.push(document);
                    }
                }
                kept
            }
            "$project" => {
                let projection = stage_document(name, body)?;
                documents
                    .iter()
                    .map(|document| project(document, projection))
                    .collect::<DocumentStoreResult<_>>()?
            }
            "$sort" => {
                sort_documents(&mut documents, stage_document(name, body)?)?;
                documents
            }
            "$skip" => documents.into_iter().skip(stage_count(name, body)?).collect(),
            "$limit" => documents.into_iter().take(stage_count(name, body)?).collect(),
            "$count" => {
                let field = body.as_str().filter(|f| !f.is_empty() && !f.starts_with('$')).ok_or_else(|| {
                    DocumentStoreError::InvalidDocument("$count needs a non-empty field name".into())
                })?;
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let mut counted = Document::new();
                    counted.insert(field, count_value(documents.len()));
                    vec![counted]
                }
            }
            "$set" | "$addFields" => {
                let fields = stage_document(name, body)?;
                documents
                    .into_iter()
                    .map(|mut document| -> DocumentStoreResult<Document> {
                        for (path, expression) in fields {
                            let value = evaluate(&document, expression)?;
                            set_path(&mut document, path, value)?;
                        }
                        Ok(document)
                    })
                    .collect::<DocumentStoreResult<_>>()?
            }
            "$unset" => {
                let paths = unset_paths(body)?;
                documents
                    .into_iter()
                    .map(|mut document| {
                        for path in &paths {
                            remove_path(&mut document, path);
                        }
                        document
                    })
                    .collect()
            }
            "$group" => group(&documents, stage_document(name, body)?)?,
            other => return Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
        };
    }

    Ok(documents)
}

pub(crate) fn validate_update_stages(stages: &[Document]) -> DocumentStoreResult<()> {
    for stage in stages {
        let (name, _) = single_stage(stage)?;
        if !UPDATE_STAGES.contains(&name) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "{name} is not allowed in an update pipeline"
            )));
        }
    }
    Ok(())
}

/// Runs an update pipeline against one document.
pub(crate) fn apply_update_stages(document: Document, stages: &[Document]) -> DocumentStoreResult<Document> {
    validate_update_stages(stages)?;

    Ok(run(vec![document], stages)?.into_iter().next().unwrap_or_default())
}

fn count_value(n: usize) -> Bson {
    i32::try_from(n)
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(n as i64))
}

fn unset_paths(body: &Bson) -> DocumentStoreResult<Vec<String>> {
    match body {
        Bson::String(path) => Ok(vec![path.clone()]),
        Bson::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    DocumentStoreError::InvalidDocument("$unset paths must be strings".into())
                })
            })
            .collect(),
        _ => Err(DocumentStoreError::InvalidDocument(
            "$unset needs a string or an array of strings".into(),
        )),
    }
}

/// Evaluates an expression; `None` means the referenced field is missing.
fn evaluate_optional(document: &Document, expression: &Bson) -> DocumentStoreResult<Option<Bson>> {
    match expression {
        Bson::String(reference) if reference.starts_with('$') => {
            Ok(get_path(document, &reference[1..]).cloned())
        }
        Bson::Document(inner) => match inner.keys().next() {
            Some(op) if op.starts_with('$') => match op.as_str() {
                "$literal" => Ok(inner.get(op).cloned()),
                other => Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
            },
            _ => {
                let mut evaluated = Document::new();
                for (key, value) in inner {
                    if let Some(value) = evaluate_optional(document, value)? {
                        evaluated.insert(key, value);
                    }
                }
                Ok(Some(Bson::Document(evaluated)))
            }
        },
        Bson::Array(items) => items
            .iter()
            .map(|item| evaluate(document, item))
            .collect::<DocumentStoreResult<Vec<_>>>()
            .map(|values| Some(Bson::Array(values))),
        literal => Ok(Some(literal.clone())),
    }
}

fn evaluate(document: &Document, expression: &Bson) -> DocumentStoreResult<Bson> {
    Ok(evaluate_optional(document, expression)?.unwrap_or(Bson::Null))
}

fn inclusion_flag(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Some(truthy(value)),
        _ => None,
    }
}

/// Applies a find-style projection. `_id` is kept unless explicitly excluded.
pub(crate) fn project(document: &Document, projection: &Document) -> DocumentStoreResult<Document> {
    let id_flag = projection.get("_id").and_then(inclusion_flag);
    let mut inclusion = None;

    for (path, value) in projection.iter().filter(|(path, _)| path.as_str() != "_id") {
        let including = inclusion_flag(value).unwrap_or(true);
        match inclusion {
            None => inclusion = Some(including),
            Some(mode) if mode != including => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot mix inclusion and exclusion in projection at '{path}'"
                )));
            }
            _ => {}
        }
    }

    if inclusion == Some(true) {
        let mut projected = Document::new();
        match projection.get("_id") {
            Some(expression) if id_flag.is_none() => {
                projected.insert("_id", evaluate(document, expression)?);
            }
            _ if id_flag != Some(false) => {
                if let Some(id) = document.get("_id") {
                    projected.insert("_id", id.clone());
                }
            }
            _ => {}
        }

        for (path, value) in projection.iter().filter(|(path, _)| path.as_str() != "_id") {
            match inclusion_flag(value) {
                Some(_) => {
                    if let Some(found) = get_path(document, path) {
                        set_path(&mut projected, path, found.clone())?;
                    }
                }
                None => set_path(&mut projected, path, evaluate(document, value)?)?,
            }
        }

        return Ok(projected);
    }

    let mut projected = document.clone();
    for (path, _) in projection.iter().filter(|(path, _)| path.as_str() != "_id") {
        remove_path(&mut projected, path);
    }
    if id_flag == Some(false) {
        projected.remove("_id");
    }

    Ok(projected)
}

fn sort_keys(sort: &Document) -> DocumentStoreResult<Vec<(&str, bool)>> {
    sort.iter()
        .map(|(path, direction)| match as_f64(direction) {
            Some(d) if d == 1.0 => Ok((path.as_str(), true)),
            Some(d) if d == -1.0 => Ok((path.as_str(), false)),
            _ => Err(DocumentStoreError::InvalidDocument(format!(
                "sort direction for '{path}' must be 1 or -1"
            ))),
        })
        .collect()
}

pub(crate) fn ordering(left: &Document, right: &Document, keys: &[(&str, bool)]) -> Ordering {
    for (path, ascending) in keys {
        let a = get_path(left, path).unwrap_or(&Bson::Null);
        let b = get_path(right, path).unwrap_or(&Bson::Null);
        let ord = compare(a, b);
        if ord != Ordering::Equal {
            return if *ascending { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Stable sort by a `{ path: 1 | -1 }` specification. Missing fields sort as null.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> DocumentStoreResult<()> {
    let keys = sort_keys(sort)?;
    documents.sort_by(|a, b| ordering(a, b, &keys));
    Ok(())
}

/// Orders indices into `documents` by a sort specification.
pub(crate) fn sort_indices(documents: &[Document], indices: &mut [usize], sort: &Document) -> DocumentStoreResult<()> {
    let keys = sort_keys(sort)?;
    indices.sort_by(|a, b| ordering(&documents[*a], &documents[*b], &keys));
    Ok(())
}

fn group(documents: &[Document], body: &Document) -> DocumentStoreResult<Vec<Document>> {
    let key_expression = body.get("_id").ok_or_else(|| {
        DocumentStoreError::InvalidDocument("$group needs an '_id' expression".into())
    })?;

    let mut groups: Vec<(Bson, Vec<&Document>)> = Vec::new();
    for document in documents {
        let key = evaluate(document, key_expression)?;
        match groups.iter_mut().find(|(existing, _)| values_equal(existing, &key)) {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }

    let mut output = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut grouped = Document::new();
        grouped.insert("_id", key);

        for (field, accumulator) in body.iter().filter(|(field, _)| field.as_str() != "_id") {
            let accumulator = accumulator.as_document().ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("accumulator for '{field}' must be a document"))
            })?;
            let (op, expression) = single_stage(accumulator)?;
            grouped.insert(field, accumulate(op, expression, &members)?);
        }

        output.push(grouped);
    }

    Ok(output)
}

fn accumulate(op: &str, expression: &Bson, members: &[&Document]) -> DocumentStoreResult<Bson> {
    let mut values = Vec::with_capacity(members.len());
    for member in members {
        values.push(evaluate_optional(member, expression)?);
    }

    Ok(match op {
        "$sum" => values
            .iter()
            .flatten()
            .filter(|v| as_f64(v).is_some())
            .fold(Bson::Int32(0), |total, v| numeric_add(&total, v).unwrap_or(total)),
        "$avg" => {
            let numbers: Vec<f64> = values.iter().flatten().filter_map(as_f64).collect();
            if numbers.is_empty() {
                Bson::Null
            } else {
                Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        "$min" | "$max" => {
            let present = values.iter().flatten().filter(|v| !matches!(v, Bson::Null));
            let picked = if op == "$min" {
                present.min_by(|a, b| compare(a, b))
            } else {
                present.max_by(|a, b| compare(a, b))
            };
            picked.cloned().unwrap_or(Bson::Null)
        }
        "$first" => values.first().cloned().flatten().unwrap_or(Bson::Null),
        "$last" => values.last().cloned().flatten().unwrap_or(Bson::Null),
        "$push" => Bson::Array(values.into_iter().flatten().collect()),
        "$count" => count_value(members.len()),
        other => return Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn orders() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "customer": "ann", "total": 30, "status": "paid" },
            doc! { "_id": 2, "customer": "bob", "total": 12.5, "status": "open" },
            doc! { "_id": 3, "customer": "ann", "total": 8, "status": "paid" },
            doc! { "_id": 4, "customer": "cat", "status": "paid" },
        ]
    }

    #[test]
    fn test_match_sort_skip_limit() {
        let out = run(
            orders(),
            &[
                doc! { "$match": { "status": "paid" } },
                doc! { "$sort": { "total": -1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 1 },
            ],
        )
        .unwrap();

        assert_eq!(out, vec![doc! { "_id": 3, "customer": "ann", "total": 8, "status": "paid" }]);
    }

    #[test]
    fn test_sort_places_missing_fields_first() {
        let mut docs = orders();

        sort_documents(&mut docs, &doc! { "total": 1 }).unwrap();

        let ids: Vec<_> = docs.iter().map(|d| d.get_i32("_id").unwrap()).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_group_accumulators() {
        let out = run(
            orders(),
            &[
                doc! { "$match": { "status": "paid" } },
                doc! { "$group": {
                    "_id": "$customer",
                    "spent": { "$sum": "$total" },
                    "average": { "$avg": "$total" },
                    "largest": { "$max": "$total" },
                    "orders": { "$push": "$_id" },
                    "n": { "$count": {} },
                } },
            ],
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                doc! { "_id": "ann", "spent": 38, "average": 19.0, "largest": 30, "orders": [1, 3], "n": 2 },
                doc! { "_id": "cat", "spent": 0, "average": Bson::Null, "largest": Bson::Null, "orders": [4], "n": 1 },
            ]
        );
    }

    #[test]
    fn test_count_stage() {
        let out = run(orders(), &[doc! { "$match": { "status": "paid" } }, doc! { "$count": "paid" }]).unwrap();
        assert_eq!(out, vec![doc! { "paid": 3 }]);

        let none = run(orders(), &[doc! { "$match": { "status": "void" } }, doc! { "$count": "n" }]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_add_fields_and_unset() {
        let out = run(
            vec![doc! { "_id": 1, "a": 1, "b": 2 }],
            &[doc! { "$set": { "copy": "$a", "fixed": { "$literal": "$a" } } }, doc! { "$unset": ["b"] }],
        )
        .unwrap();

        assert_eq!(out, vec![doc! { "_id": 1, "a": 1, "copy": 1, "fixed": "$a" }]);
    }

    #[test]
    fn test_projection_modes() {
        let d = doc! { "_id": 7, "name": "Alice", "address": { "city": "Paris", "zip": "75001" } };

        assert_eq!(
            project(&d, &doc! { "name": 1, "address.city": 1 }).unwrap(),
            doc! { "_id": 7, "name": "Alice", "address": { "city": "Paris" } }
        );
        assert_eq!(project(&d, &doc! { "name": 1, "_id": 0 }).unwrap(), doc! { "name": "Alice" });
        assert_eq!(project(&d, &doc! { "address": 0 }).unwrap(), doc! { "_id": 7, "name": "Alice" });
        assert_eq!(
            project(&d, &doc! { "_id": 0 }).unwrap(),
            doc! { "name": "Alice", "address": { "city": "Paris", "zip": "75001" } }
        );
        assert!(project(&d, &doc! { "name": 1, "address": 0 }).is_err());
    }

    #[test]
    fn test_stage_shape_and_unknown_stage() {
        assert!(matches!(
            run(orders(), &[doc! { "$match": {}, "$limit": 1 }]),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            run(orders(), &[doc! { "$lookup": { "from": "other" } }]),
            Err(DocumentStoreError::UnsupportedOperator(stage)) if stage == "$lookup"
        ));
    }

    #[test]
    fn test_update_pipeline_rejects_query_stages() {
        assert!(validate_update_stages(&[doc! { "$set": { "a": 1 } }]).is_ok());
        assert!(validate_update_stages(&[doc! { "$match": {} }]).is_err());
    }
}
