//! Query translation from docbridge expressions to MongoDB query syntax.
//!
//! String operators compile to anchored, escaped, case-sensitive `$regex` patterns. When
//! translating an array filter, every field name is prefixed with the filter identifier,
//! and the empty field name becomes the identifier itself.

use bson::{Document, Bson, doc};

use docbridge_core::{
    query::{ArrayFilter, QueryVisitor, Expr, FieldOp, Sort, SortDirection},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Translates docbridge query expressions into MongoDB query documents.
#[derive(Debug, Default)]
pub(crate) struct MongoQueryTranslator {
    prefix: Option<String>,
}

impl MongoQueryTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A translator for the element-relative filter of `$[identifier]`.
    pub fn scoped(identifier: &str) -> Self {
        Self { prefix: Some(identifier.to_string()) }
    }

    pub fn translate(filter: &Expr) -> DocumentStoreResult<Document> {
        Self::new().visit_expr(filter)
    }

    pub fn translate_array_filters(array_filters: &[ArrayFilter]) -> DocumentStoreResult<Vec<Document>> {
        array_filters
            .iter()
            .map(|array_filter| Self::scoped(&array_filter.identifier).visit_expr(&array_filter.filter))
            .collect()
    }

    pub fn translate_sort(sort: &Sort) -> Document {
        doc! {
            sort.field.clone(): match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }
        }
    }

    fn path(&self, field: &str) -> String {
        match (&self.prefix, field.is_empty()) {
            (Some(prefix), true) => prefix.clone(),
            (Some(prefix), false) => format!("{prefix}.{field}"),
            (None, _) => field.to_string(),
        }
    }

    fn translate_all(&mut self, exprs: &[Expr]) -> DocumentStoreResult<Vec<Document>> {
        exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect()
    }
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\^$.|?*+()[]{}-/".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn require_string<'a>(op: &str, value: &'a Bson) -> DocumentStoreResult<&'a str> {
    match value {
        Bson::String(s) => Ok(s),
        other => Err(DocumentStoreError::InvalidParams(format!(
            "{op} requires a string value, got {:?}",
            other.element_type(),
        ))),
    }
}

fn as_array(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        single => Bson::Array(vec![single.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! { "$and": self.translate_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // `$or` rejects an empty list; an empty disjunction matches nothing.
        if exprs.is_empty() {
            return Ok(doc! { "$expr": false });
        }

        Ok(doc! { "$or": self.translate_all(exprs)? })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$nor": [self.visit_expr(expr)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            self.path(field): { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            self.path(field): match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(s) },
                    Bson::Array(arr) => doc! { "$all": arr },
                    other => doc! { "$eq": other },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                    Bson::Array(arr) => doc! { "$not": { "$all": arr } },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => {
                    doc! { "$regex": format!("^{}", escape_regex(require_string("starts_with", value)?)) }
                }
                FieldOp::EndsWith => {
                    doc! { "$regex": format!("{}$", escape_regex(require_string("ends_with", value)?)) }
                }
                FieldOp::AnyOf => doc! { "$in": as_array(value) },
                FieldOp::NoneOf => doc! { "$nin": as_array(value) },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::query::Filter;

    #[test]
    fn match_all_is_the_empty_document() {
        assert_eq!(MongoQueryTranslator::translate(&Filter::all()).unwrap(), doc! {});
    }

    #[test]
    fn comparisons_and_conjunctions() {
        let filter = Filter::id("a").and(Filter::gt("age", 18));
        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "$and": [{ "id": { "$eq": "a" } }, { "age": { "$gt": 18 } }] },
        );
    }

    #[test]
    fn negation_uses_nor() {
        let filter = Filter::eq("name", "x").not();
        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "$nor": [{ "name": { "$eq": "x" } }] },
        );
    }

    #[test]
    fn string_operators_escape_their_input() {
        assert_eq!(
            MongoQueryTranslator::translate(&Filter::starts_with("email", "a.b+")).unwrap(),
            doc! { "email": { "$regex": "^a\\.b\\+" } },
        );
        assert_eq!(
            MongoQueryTranslator::translate(&Filter::contains("name", "(x)")).unwrap(),
            doc! { "name": { "$regex": "\\(x\\)" } },
        );
    }

    #[test]
    fn string_operators_reject_other_types() {
        let err = MongoQueryTranslator::translate(&Filter::ends_with("n", 3)).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidParams(_)));
    }

    #[test]
    fn any_of_wraps_single_values() {
        assert_eq!(
            MongoQueryTranslator::translate(&Filter::any_of("role", "admin")).unwrap(),
            doc! { "role": { "$in": ["admin"] } },
        );
    }

    #[test]
    fn array_filters_are_prefixed_with_their_identifier() {
        let filters = MongoQueryTranslator::translate_array_filters(&[
            ArrayFilter::new("task", Filter::eq("id", "t1")),
            ArrayFilter::new("label", Filter::eq("", "red")),
        ])
        .unwrap();

        assert_eq!(
            filters,
            vec![
                doc! { "task.id": { "$eq": "t1" } },
                doc! { "label": { "$eq": "red" } },
            ],
        );
    }

    #[test]
    fn sort_directions() {
        let sort = Sort { field: "id".into(), direction: SortDirection::Desc };
        assert_eq!(MongoQueryTranslator::translate_sort(&sort), doc! { "id": -1 });
    }
}
