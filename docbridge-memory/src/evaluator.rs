//! Query expression evaluation for in-memory document filtering.
//!
//! Field names are dotted paths. A path crossing an array fans out over its elements, and a
//! numeric segment indexes into the array, so `tags` equal to `"x"` matches `["x", "y"]`
//! and `tasks.id` matches when any task carries that id. The empty path refers to the
//! evaluated value itself, which is how array filters address arrays of scalars.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use docbridge_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64` so `Int32(1)` equals `Int64(1)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Bool(_) => 5,
            Comparable::DateTime(_) => 6,
        }
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect()
            ),
            // Other types are not comparable
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Total order used for sorting: missing and null first, then by type rank, then by value.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.rank()
        .cmp(&right.rank())
        .then_with(|| left.partial_cmp(&right).unwrap_or(Ordering::Equal))
}

/// Splits a dotted field name into path segments. The empty name is the empty path.
pub(crate) fn split_path(field: &str) -> Vec<&str> {
    if field.is_empty() {
        Vec::new()
    } else {
        field.split('.').collect()
    }
}

/// Collects every value reachable from `value` along `path`.
pub(crate) fn resolve<'a>(value: &'a Bson, path: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = path.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(*head) {
                resolve(next, rest, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    resolve(item, rest, out);
                }
            }
            for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                resolve(item, path, out);
            }
        }
        _ => {}
    }
}

/// Collects every value reachable from the top-level `document` along `path`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &[&str], out: &mut Vec<&'a Bson>) {
    if let Some((head, rest)) = path.split_first() {
        if let Some(value) = document.get(*head) {
            resolve(value, rest, out);
        }
    }
}

enum Target<'a> {
    Document(&'a Document),
    Value(&'a Bson),
}

/// Evaluates filter expressions against a stored document or a single array element.
pub(crate) struct DocumentEvaluator<'a> {
    target: Target<'a>,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { target: Target::Document(document) }
    }

    pub fn for_value(value: &'a Bson) -> Self {
        Self { target: Target::Value(value) }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    fn candidates(&self, field: &str) -> Vec<&'a Bson> {
        let path = split_path(field);
        let mut out = Vec::new();
        match self.target {
            Target::Document(document) => lookup(document, &path, &mut out),
            Target::Value(value) => resolve(value, &path, &mut out),
        }
        out
    }
}

/// Tests `predicate` against a candidate and, when it is an array, against its elements.
fn any_value(candidates: &[&Bson], mut predicate: impl FnMut(&Comparable<'_>) -> bool) -> bool {
    candidates.iter().any(|candidate| {
        let value = Comparable::from(*candidate);
        if predicate(&value) {
            return true;
        }
        match value {
            Comparable::Array(items) => items.iter().any(&mut predicate),
            _ => false,
        }
    })
}

/// Substring match on strings (or string elements), superset match for array needles,
/// membership for anything else.
fn contains(candidates: &[&Bson], needle: &Comparable<'_>) -> bool {
    match needle {
        Comparable::String(needle) => any_value(candidates, |value| {
            matches!(value, Comparable::String(haystack) if haystack.contains(needle))
        }),
        Comparable::Array(needles) => candidates
            .iter()
            .any(|candidate| match Comparable::from(*candidate) {
                Comparable::Array(items) => needles.iter().all(|needle| items.contains(needle)),
                _ => false,
            }),
        other => any_value(candidates, |value| value == other),
    }
}

fn any_of(candidates: &[&Bson], values: &Bson) -> bool {
    let values = match Comparable::from(values) {
        Comparable::Array(values) => values,
        single => vec![single],
    };
    any_value(candidates, |value| values.iter().any(|candidate| candidate == value))
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(!self.candidates(field).is_empty() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let candidates = self.candidates(field);
        let target = Comparable::from(value);

        let matched = match op {
            FieldOp::Eq => any_value(&candidates, |candidate| candidate == &target),
            FieldOp::Ne => !any_value(&candidates, |candidate| candidate == &target),
            FieldOp::Gt => any_value(&candidates, |candidate| candidate > &target),
            FieldOp::Gte => any_value(&candidates, |candidate| candidate >= &target),
            FieldOp::Lt => any_value(&candidates, |candidate| candidate < &target),
            FieldOp::Lte => any_value(&candidates, |candidate| candidate <= &target),
            FieldOp::Contains => contains(&candidates, &target),
            FieldOp::NotContains => !contains(&candidates, &target),
            FieldOp::StartsWith => any_value(&candidates, |candidate| match (candidate, &target) {
                (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
                _ => false,
            }),
            FieldOp::EndsWith => any_value(&candidates, |candidate| match (candidate, &target) {
                (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
                _ => false,
            }),
            FieldOp::AnyOf => any_of(&candidates, value),
            FieldOp::NoneOf => !any_of(&candidates, value),
        };

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docbridge_core::query::Filter;

    fn matches(document: Document, expr: &Expr) -> bool {
        DocumentEvaluator::new(&document)
            .evaluate(expr)
            .unwrap()
    }

    #[test]
    fn empty_conjunction_matches_everything() {
        assert!(matches(doc! {}, &Filter::all()));
    }

    #[test]
    fn numbers_compare_across_widths() {
        let doc = doc! { "n": 3_i32 };
        assert!(matches(doc.clone(), &Filter::eq("n", 3_i64)));
        assert!(matches(doc.clone(), &Filter::gt("n", 2.5)));
        assert!(!matches(doc, &Filter::lt("n", 3_i64)));
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let doc = doc! { "verification": { "code": "abc" } };
        assert!(matches(doc.clone(), &Filter::eq("verification.code", "abc")));
        assert!(matches(doc.clone(), &Filter::exists("verification.code")));
        assert!(matches(doc, &Filter::not_exists("verification.expires")));
    }

    #[test]
    fn equality_on_arrays_is_membership() {
        let doc = doc! { "auth": { "subs": ["a", "b"] } };
        assert!(matches(doc.clone(), &Filter::eq("auth.subs", "b")));
        assert!(!matches(doc.clone(), &Filter::eq("auth.subs", "c")));
        assert!(matches(doc, &Filter::ne("auth.subs", "c")));
    }

    #[test]
    fn paths_fan_out_over_arrays_of_documents() {
        let doc = doc! { "tasks": [{ "id": "t1" }, { "id": "t2" }] };
        assert!(matches(doc.clone(), &Filter::eq("tasks.id", "t2")));
        assert!(matches(doc.clone(), &Filter::eq("tasks.1.id", "t2")));
        assert!(!matches(doc, &Filter::eq("tasks.0.id", "t2")));
    }

    #[test]
    fn empty_path_is_the_value_itself() {
        let element = Bson::String("red".into());
        assert!(DocumentEvaluator::for_value(&element).evaluate(&Filter::eq("", "red")).unwrap());
        assert!(!DocumentEvaluator::for_value(&element).evaluate(&Filter::eq("", "blue")).unwrap());
    }

    #[test]
    fn ne_matches_missing_fields() {
        assert!(matches(doc! {}, &Filter::ne("name", "x")));
        assert!(!matches(doc! {}, &Filter::eq("name", "x")));
    }

    #[test]
    fn string_operators() {
        let doc = doc! { "email": "ann@example.com" };
        assert!(matches(doc.clone(), &Filter::starts_with("email", "ann@")));
        assert!(matches(doc.clone(), &Filter::ends_with("email", ".com")));
        assert!(matches(doc.clone(), &Filter::contains("email", "example")));
        assert!(matches(doc, &Filter::not_contains("email", "zzz")));
    }

    #[test]
    fn contains_on_arrays() {
        let doc = doc! { "tags": ["alpha", "beta"], "scores": [1, 2, 3] };
        assert!(matches(doc.clone(), &Filter::contains("tags", "lph")));
        assert!(matches(doc.clone(), &Filter::contains("scores", vec![1, 3])));
        assert!(!matches(doc.clone(), &Filter::contains("scores", vec![1, 4])));
        assert!(matches(doc.clone(), &Filter::contains("scores", 2)));
        assert!(matches(doc, &Filter::not_contains("tags", "gamma")));
    }

    #[test]
    fn any_of_and_none_of() {
        let doc = doc! { "role": "admin", "tags": ["x", "y"] };
        assert!(matches(doc.clone(), &Filter::any_of("role", vec!["admin", "owner"])));
        assert!(matches(doc.clone(), &Filter::any_of("tags", vec!["y"])));
        assert!(matches(doc.clone(), &Filter::none_of("tags", vec!["z"])));
        assert!(!matches(doc, &Filter::none_of("role", vec!["admin"])));
    }

    #[test]
    fn sort_order_puts_missing_first() {
        let one = Bson::Int32(1);
        let text = Bson::String("a".into());
        assert_eq!(compare_values(None, Some(&one)), Ordering::Less);
        assert_eq!(compare_values(Some(&one), Some(&text)), Ordering::Less);
        assert_eq!(compare_values(Some(&text), Some(&text)), Ordering::Equal);
    }
}
