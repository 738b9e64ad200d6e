// EntComment - a comment with at most one authoring user

use serde::{Deserialize, Serialize};

use super::{EntUser, EntityType};
use crate::core::DocumentId;
use crate::ent_framework::reference;
use crate::ent_framework::{Entity, Ref};
use crate::schemas::CommentSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntComment {
    #[serde(rename = "_id", default)]
    pub id: DocumentId,
    #[serde(default)]
    pub content: String,
    /// Author; `Some(Ref::Absent)` once populated against a deleted user
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "reference::deserialize_optional"
    )]
    pub user: Option<Ref<EntUser>>,
    #[serde(skip)]
    is_new: bool,
}

impl EntComment {
    pub fn new(content: &str) -> Self {
        Self {
            id: DocumentId::new(),
            content: content.to_string(),
            user: None,
            is_new: true,
        }
    }

    pub fn with_author(mut self, author: &EntUser) -> Self {
        self.user = Some(Ref::from(author));
        self
    }
}

impl Entity for EntComment {
    const ENTITY_TYPE: EntityType = EntityType::Comment;
    type Schema = CommentSchema;

    fn id(&self) -> DocumentId {
        self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn set_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }
}
