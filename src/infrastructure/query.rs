// Query primitives - document filters and update modifiers evaluated by the storage backends

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use crate::core::document::{remove_at_path, slot_at_path, values_at_path, Document, ID_FIELD};
use crate::core::DocumentId;
use crate::error::{AppError, AppResult};

/// Document filter, the query language shared by every backend
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Exists(String, bool),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn all() -> Self {
        Filter::All
    }

    pub fn eq(path: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(path.to_string(), value.into())
    }

    pub fn ne(path: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(path.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(path: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(path.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn gt(path: &str, value: impl Into<Value>) -> Self {
        Filter::Gt(path.to_string(), value.into())
    }

    pub fn gte(path: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(path.to_string(), value.into())
    }

    pub fn lt(path: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(path.to_string(), value.into())
    }

    pub fn lte(path: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(path.to_string(), value.into())
    }

    pub fn exists(path: &str, exists: bool) -> Self {
        Filter::Exists(path.to_string(), exists)
    }

    /// Match a single document by identifier
    pub fn id(id: DocumentId) -> Self {
        Filter::Eq(ID_FIELD.to_string(), id.into())
    }

    /// Match every document whose identifier is listed
    pub fn id_in(ids: impl IntoIterator<Item = DocumentId>) -> Self {
        Filter::is_in(ID_FIELD, ids)
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, other) => Filter::And(vec![f, other]),
        }
    }

    /// The identifier this filter pins down, when it is a plain `_id` match
    pub fn as_id(&self) -> Option<DocumentId> {
        match self {
            Filter::Eq(path, Value::String(s)) if path == ID_FIELD => s.parse().ok(),
            _ => None,
        }
    }

    /// Parse a JSON query object such as `{"name": "Joe", "likes": {"$gt": 5}}`
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Filter::All),
            other => {
                return Err(AppError::BadRequest(format!(
                    "filter must be an object, got {}",
                    other
                )))
            }
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, condition) in map {
            match key.as_str() {
                "$and" | "$or" => {
                    let items = condition.as_array().ok_or_else(|| {
                        AppError::BadRequest(format!("{} expects an array of filters", key))
                    })?;
                    let parsed = items
                        .iter()
                        .map(Filter::from_value)
                        .collect::<AppResult<Vec<_>>>()?;
                    clauses.push(if key == "$and" {
                        Filter::And(parsed)
                    } else {
                        Filter::Or(parsed)
                    });
                }
                op if op.starts_with('$') => {
                    return Err(AppError::BadRequest(format!(
                        "unknown top-level operator {}",
                        op
                    )))
                }
                path => clauses.extend(Self::parse_condition(path, condition)?),
            }
        }

        Ok(match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        })
    }

    fn parse_condition(path: &str, condition: &Value) -> AppResult<Vec<Filter>> {
        let operators = match condition {
            Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
            _ => return Ok(vec![Filter::eq(path, condition.clone())]),
        };

        operators
            .iter()
            .map(|(op, operand)| {
                Ok(match op.as_str() {
                    "$eq" => Filter::eq(path, operand.clone()),
                    "$ne" => Filter::ne(path, operand.clone()),
                    "$gt" => Filter::gt(path, operand.clone()),
                    "$gte" => Filter::gte(path, operand.clone()),
                    "$lt" => Filter::lt(path, operand.clone()),
                    "$lte" => Filter::lte(path, operand.clone()),
                    "$exists" => Filter::exists(path, operand.as_bool().unwrap_or(true)),
                    "$in" => {
                        let values = operand.as_array().ok_or_else(|| {
                            AppError::BadRequest(format!("$in on '{}' expects an array", path))
                        })?;
                        Filter::In(path.to_string(), values.clone())
                    }
                    other => {
                        return Err(AppError::BadRequest(format!(
                            "unknown operator {} on '{}'",
                            other, path
                        )))
                    }
                })
            })
            .collect()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, value) => matches_eq(doc, path, value),
            Filter::Ne(path, value) => !matches_eq(doc, path, value),
            Filter::In(path, values) => values.iter().any(|v| matches_eq(doc, path, v)),
            Filter::Gt(path, value) => matches_ordering(doc, path, value, |o| o == Ordering::Greater),
            Filter::Gte(path, value) => matches_ordering(doc, path, value, |o| o != Ordering::Less),
            Filter::Lt(path, value) => matches_ordering(doc, path, value, |o| o == Ordering::Less),
            Filter::Lte(path, value) => {
                matches_ordering(doc, path, value, |o| o != Ordering::Greater)
            }
            Filter::Exists(path, exists) => !values_at_path(doc, path).is_empty() == *exists,
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

fn matches_eq(doc: &Document, path: &str, expected: &Value) -> bool {
    let found = values_at_path(doc, path);
    if expected.is_null() && found.is_empty() {
        return true;
    }
    found.iter().any(|value| {
        values_equal(value, expected)
            || matches!(value, Value::Array(items) if items.iter().any(|item| values_equal(item, expected)))
    })
}

fn matches_ordering(
    doc: &Document,
    path: &str,
    bound: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    values_at_path(doc, path).into_iter().any(|value| match value {
        Value::Array(items) => items
            .iter()
            .any(|item| compare_values(item, bound).is_some_and(&accept)),
        _ => compare_values(value, bound).is_some_and(&accept),
    })
}

/// Equality that treats `10` and `10.0` as the same number
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Update modifiers applied server-side to every matched document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Map<String, Value>,
    unset: Vec<String>,
    inc: Map<String, Value>,
    push: Map<String, Value>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set.insert(path.to_string(), value.into());
        self
    }

    pub fn unset(mut self, path: &str) -> Self {
        self.unset.push(path.to_string());
        self
    }

    /// Atomic increment; the delta is applied to whatever value is stored
    /// when the write happens, not to a previously read copy.
    pub fn inc(mut self, path: &str, delta: impl Into<Number>) -> Self {
        self.inc.insert(path.to_string(), Value::Number(delta.into()));
        self
    }

    pub fn push(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.push.insert(path.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.inc.is_empty() && self.push.is_empty()
    }

    pub fn set_fields(&self) -> &Map<String, Value> {
        &self.set
    }

    pub fn unset_fields(&self) -> &[String] {
        &self.unset
    }

    pub fn inc_fields(&self) -> &Map<String, Value> {
        &self.inc
    }

    pub fn push_fields(&self) -> &Map<String, Value> {
        &self.push
    }

    pub fn set_fields_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.set.iter_mut()
    }

    pub fn push_fields_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.push.iter_mut()
    }

    /// Parse `{"name": "Alex"}` (implicit `$set`) or operator documents such
    /// as `{"$inc": {"likes": 10}}`
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let map = value.as_object().ok_or_else(|| {
            AppError::BadRequest(format!("update must be an object, got {}", value))
        })?;

        let mut update = Update::new();
        for (key, operand) in map {
            match key.as_str() {
                "$set" => {
                    for (path, v) in operator_fields(key, operand)? {
                        update.set.insert(path.clone(), v.clone());
                    }
                }
                "$unset" => {
                    for (path, _) in operator_fields(key, operand)? {
                        update.unset.push(path.clone());
                    }
                }
                "$inc" => {
                    for (path, v) in operator_fields(key, operand)? {
                        if !v.is_number() {
                            return Err(AppError::BadRequest(format!(
                                "$inc on '{}' requires a numeric delta",
                                path
                            )));
                        }
                        update.inc.insert(path.clone(), v.clone());
                    }
                }
                "$push" => {
                    for (path, v) in operator_fields(key, operand)? {
                        update.push.insert(path.clone(), v.clone());
                    }
                }
                op if op.starts_with('$') => {
                    return Err(AppError::BadRequest(format!("unknown update operator {}", op)))
                }
                path => {
                    update.set.insert(path.to_string(), operand.clone());
                }
            }
        }
        Ok(update)
    }

    /// Apply the modifiers to `doc`, returning whether anything changed.
    ///
    /// On error `doc` may be partially modified; backends apply updates to a
    /// copy and only write it back on success.
    pub fn apply(&self, doc: &mut Document) -> AppResult<bool> {
        self.check_immutable_id(doc)?;
        let mut modified = false;

        for (path, value) in &self.set {
            if path == ID_FIELD {
                continue;
            }
            let slot = slot_at_path(doc, path).ok_or_else(|| not_traversable(path))?;
            if !values_equal(slot, value) {
                *slot = value.clone();
                modified = true;
            }
        }

        for path in &self.unset {
            modified |= remove_at_path(doc, path).is_some();
        }

        for (path, delta) in &self.inc {
            let slot = slot_at_path(doc, path).ok_or_else(|| not_traversable(path))?;
            let next = match (&*slot, delta) {
                (Value::Null, Value::Number(d)) => Value::Number(d.clone()),
                (Value::Number(current), Value::Number(d)) => Value::Number(add_numbers(current, d)?),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "Cannot apply $inc to a value of non-numeric type at '{}'",
                        path
                    )))
                }
            };
            *slot = next;
            modified = true;
        }

        for (path, value) in &self.push {
            let slot = slot_at_path(doc, path).ok_or_else(|| not_traversable(path))?;
            match slot {
                Value::Null => *slot = Value::Array(vec![value.clone()]),
                Value::Array(items) => items.push(value.clone()),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "The field '{}' must be an array to $push",
                        path
                    )))
                }
            }
            modified = true;
        }

        Ok(modified)
    }

    fn check_immutable_id(&self, doc: &Document) -> AppResult<()> {
        let touches_id = |path: &String| path == ID_FIELD || path.starts_with("_id.");
        let id_changed = self
            .set
            .get(ID_FIELD)
            .is_some_and(|v| doc.get(ID_FIELD) != Some(v));
        if id_changed
            || self.set.keys().any(|p| p.starts_with("_id."))
            || self.unset.iter().any(touches_id)
            || self.inc.keys().any(touches_id)
            || self.push.keys().any(touches_id)
        {
            return Err(AppError::BadRequest(
                "Performing an update on the path '_id' would modify the immutable field '_id'"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn operator_fields<'a>(op: &str, operand: &'a Value) -> AppResult<&'a Map<String, Value>> {
    operand
        .as_object()
        .ok_or_else(|| AppError::BadRequest(format!("{} expects an object of fields", op)))
}

fn not_traversable(path: &str) -> AppError {
    AppError::BadRequest(format!("Cannot create field along path '{}'", path))
}

fn add_numbers(a: &Number, b: &Number) -> AppResult<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum)
        .ok_or_else(|| AppError::BadRequest("increment produced a non-finite number".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_eq_matches_scalars_and_array_members() {
        let d = doc(json!({"name": "Joe", "tags": ["a", "b"], "likes": 10}));
        assert!(Filter::eq("name", "Joe").matches(&d));
        assert!(!Filter::eq("name", "Alex").matches(&d));
        assert!(Filter::eq("tags", "b").matches(&d));
        assert!(Filter::eq("likes", 10.0).matches(&d));
        assert!(Filter::eq("missing", Value::Null).matches(&d));
    }

    #[test]
    fn test_parse_operator_filters() {
        let filter = Filter::from_value(&json!({
            "name": "Joe",
            "likes": {"$gte": 5, "$lt": 20}
        }))
        .unwrap();

        assert!(filter.matches(&doc(json!({"name": "Joe", "likes": 10}))));
        assert!(!filter.matches(&doc(json!({"name": "Joe", "likes": 20}))));
        assert!(!filter.matches(&doc(json!({"name": "Alex", "likes": 10}))));
    }

    #[test]
    fn test_parse_logical_and_in() {
        let filter = Filter::from_value(&json!({
            "$or": [{"name": {"$in": ["Joe", "Alex"]}}, {"likes": {"$gt": 100}}]
        }))
        .unwrap();

        assert!(filter.matches(&doc(json!({"name": "Alex"}))));
        assert!(filter.matches(&doc(json!({"name": "Zed", "likes": 101}))));
        assert!(!filter.matches(&doc(json!({"name": "Zed", "likes": 1}))));
    }

    #[test]
    fn test_parse_rejects_unknown_operator() {
        let err = Filter::from_value(&json!({"likes": {"$near": 1}})).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_id_filter_roundtrip() {
        let id = DocumentId::new();
        let filter = Filter::id(id);
        assert_eq!(filter.as_id(), Some(id));
        assert!(filter.matches(&doc(json!({"_id": id.to_string()}))));
        assert_eq!(Filter::eq("name", "Joe").as_id(), None);
    }

    #[test]
    fn test_and_flattens_and_drops_all() {
        let filter = Filter::all().and(Filter::eq("a", 1)).and(Filter::eq("b", 2));
        assert_eq!(
            filter,
            Filter::And(vec![Filter::eq("a", 1), Filter::eq("b", 2)])
        );
    }

    #[test]
    fn test_plain_fields_are_set() {
        let update = Update::from_value(&json!({"name": "Alex"})).unwrap();
        let mut d = doc(json!({"name": "Joe"}));
        assert!(update.apply(&mut d).unwrap());
        assert_eq!(d["name"], json!("Alex"));
        assert!(!update.apply(&mut d).unwrap());
    }

    #[test]
    fn test_inc_adds_to_stored_value() {
        let update = Update::from_value(&json!({"$inc": {"likes": 10}})).unwrap();
        let mut d = doc(json!({"likes": 0}));
        update.apply(&mut d).unwrap();
        update.apply(&mut d).unwrap();
        assert_eq!(d["likes"], json!(20));

        let mut fresh = doc(json!({}));
        update.apply(&mut fresh).unwrap();
        assert_eq!(fresh["likes"], json!(10));
    }

    #[test]
    fn test_inc_rejects_non_numeric_target() {
        let update = Update::new().inc("name", 1);
        let mut d = doc(json!({"name": "Joe"}));
        assert!(matches!(update.apply(&mut d), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_push_and_unset() {
        let update = Update::new().push("blogPosts", "b1").unset("legacy");
        let mut d = doc(json!({"legacy": true}));
        assert!(update.apply(&mut d).unwrap());
        assert_eq!(d["blogPosts"], json!(["b1"]));
        assert!(d.get("legacy").is_none());
    }

    #[test]
    fn test_id_is_immutable() {
        let id = DocumentId::new();
        let mut d = doc(json!({"_id": id.to_string()}));

        let same = Update::new().set("_id", id.to_string());
        assert!(!same.apply(&mut d).unwrap());

        let other = Update::new().set("_id", DocumentId::new().to_string());
        assert!(matches!(other.apply(&mut d), Err(AppError::BadRequest(_))));
        assert!(matches!(
            Update::new().unset("_id").apply(&mut d),
            Err(AppError::BadRequest(_))
        ));
    }
}
