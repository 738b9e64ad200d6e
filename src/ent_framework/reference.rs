// References between entities: stored as an id, optionally resolved into the full entity

use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::DocumentId;
use crate::ent_framework::ent_trait::Entity;

/// A reference to another entity.
///
/// Only the identifier is ever persisted. `Loaded` carries the entity a
/// population resolved; `Absent` marks a reference whose target no longer
/// exists (serialized as null).
#[derive(Debug, Clone, PartialEq)]
pub enum Ref<T> {
    Id(DocumentId),
    Loaded(Box<T>),
    Absent,
}

impl<T: Entity> Ref<T> {
    /// Identifier of the referenced entity, `None` for `Absent`
    pub fn id(&self) -> Option<DocumentId> {
        match self {
            Ref::Id(id) => Some(*id),
            Ref::Loaded(entity) => Some(entity.id()),
            Ref::Absent => None,
        }
    }
}

impl<T> Ref<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Ref::Loaded(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn into_loaded(self) -> Option<T> {
        match self {
            Ref::Loaded(entity) => Some(*entity),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Ref::Loaded(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Ref::Absent)
    }
}

impl<T> From<DocumentId> for Ref<T> {
    fn from(id: DocumentId) -> Self {
        Ref::Id(id)
    }
}

impl<T: Clone> From<&T> for Ref<T> {
    fn from(entity: &T) -> Self {
        Ref::Loaded(Box::new(entity.clone()))
    }
}

impl<T: Entity> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.id() {
            Some(id) => id.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Ref::Absent),
            Value::String(s) => s.parse().map(Ref::Id).map_err(D::Error::custom),
            object @ Value::Object(_) => serde_json::from_value(object)
                .map(|entity| Ref::Loaded(Box::new(entity)))
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!(
                "expected an id, a document or null for a reference, got {}",
                other
            ))),
        }
    }
}

/// Deserializer for `Option<Ref<T>>` fields: a missing key stays `None`
/// (via `#[serde(default)]`) while an explicit null becomes `Some(Ref::Absent)`.
pub fn deserialize_optional<'de, D, T>(deserializer: D) -> Result<Option<Ref<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ref::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EntBlogPost, EntComment};
    use serde_json::json;

    #[test]
    fn test_serializes_as_bare_id() {
        let post = EntBlogPost::new("T", "C");
        let id = post.id;

        assert_eq!(
            serde_json::to_value(Ref::<EntBlogPost>::Id(id)).unwrap(),
            json!(id.to_string())
        );
        assert_eq!(
            serde_json::to_value(Ref::from(&post)).unwrap(),
            json!(id.to_string())
        );
        assert_eq!(
            serde_json::to_value(Ref::<EntBlogPost>::Absent).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_deserializes_id_document_and_null() {
        let id = DocumentId::new();
        let by_id: Ref<EntComment> = serde_json::from_value(json!(id.to_string())).unwrap();
        assert_eq!(by_id, Ref::Id(id));

        let loaded: Ref<EntComment> =
            serde_json::from_value(json!({"_id": id.to_string(), "content": "C"})).unwrap();
        assert_eq!(loaded.id(), Some(id));
        assert_eq!(loaded.loaded().unwrap().content, "C");

        let absent: Ref<EntComment> = serde_json::from_value(Value::Null).unwrap();
        assert!(absent.is_absent());

        assert!(serde_json::from_value::<Ref<EntComment>>(json!(12)).is_err());
        assert!(serde_json::from_value::<Ref<EntComment>>(json!("not-an-id")).is_err());
    }
}
