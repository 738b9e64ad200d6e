// Document helpers - the persisted representation of every entity is a JSON object

use serde_json::{Map, Value};

use crate::core::strong_types::DocumentId;

pub type Document = Map<String, Value>;

/// Key under which every document stores its identifier
pub const ID_FIELD: &str = "_id";

/// Read the identifier of a stored document
pub fn document_id(doc: &Document) -> Option<DocumentId> {
    doc.get(ID_FIELD).and_then(value_id)
}

/// Identifier carried by a reference value: a bare id string or an embedded
/// (populated) document with an `_id`.
pub fn value_id(value: &Value) -> Option<DocumentId> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => map.get(ID_FIELD).and_then(value_id),
        _ => None,
    }
}

/// Collect every value reachable through a dotted path.
///
/// Arrays are traversed transparently, so `posts.url` yields the url of every
/// embedded post. Numeric segments index into arrays.
pub fn values_at_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let first = match segments.next() {
        Some(segment) => segment,
        None => return Vec::new(),
    };

    let mut current: Vec<&Value> = doc.get(first).into_iter().collect();
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            descend(value, segment, &mut next);
        }
        current = next;
    }
    current
}

fn descend<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                out.push(child);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(child) = items.get(index) {
                    out.push(child);
                }
                return;
            }
            for item in items {
                if let Value::Object(map) = item {
                    if let Some(child) = map.get(segment) {
                        out.push(child);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Mutable access to the slot a dotted path points at, creating intermediate
/// objects as needed. Returns `None` when the path crosses a scalar.
pub fn slot_at_path<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.entry(first.to_string()).or_insert(Value::Null);

    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let parent = current;
        current = match parent {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = segment.parse::<usize>().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Remove the value at a dotted path, returning it when present
pub fn remove_at_path(doc: &mut Document, path: &str) -> Option<Value> {
    let (parent, leaf) = match path.rsplit_once('.') {
        None => return doc.remove(path),
        Some(split) => split,
    };

    let mut segments = parent.split('.');
    let mut current = doc.get_mut(segments.next()?)?;
    for segment in segments {
        let node = current;
        current = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Object(map) => map.remove(leaf),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_values_at_path_descends_arrays() {
        let d = doc(json!({
            "name": "Joe",
            "posts": [{"url": "a"}, {"url": "b"}]
        }));
        let urls: Vec<&Value> = values_at_path(&d, "posts.url");
        assert_eq!(urls, vec![&json!("a"), &json!("b")]);
        assert_eq!(values_at_path(&d, "posts.1.url"), vec![&json!("b")]);
        assert!(values_at_path(&d, "missing.field").is_empty());
    }

    #[test]
    fn test_value_id_accepts_string_and_populated_document() {
        let id = DocumentId::new();
        assert_eq!(value_id(&json!(id.to_string())), Some(id));
        assert_eq!(value_id(&json!({"_id": id.to_string(), "title": "T"})), Some(id));
        assert_eq!(value_id(&json!(42)), None);
    }

    #[test]
    fn test_slot_and_remove_at_path() {
        let mut d = doc(json!({"profile": {"city": "Oslo"}}));
        *slot_at_path(&mut d, "profile.country").unwrap() = json!("NO");
        assert_eq!(d["profile"]["country"], json!("NO"));

        assert_eq!(remove_at_path(&mut d, "profile.city"), Some(json!("Oslo")));
        assert!(d["profile"].get("city").is_none());
        assert!(slot_at_path(&mut d, "profile.country.deeper").is_none());
    }
}
