// EntBlogPost - titled content referencing its comments

use serde::{Deserialize, Serialize};

use super::{EntComment, EntityType};
use crate::core::DocumentId;
use crate::ent_framework::{Entity, Ref};
use crate::schemas::BlogPostSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntBlogPost {
    #[serde(rename = "_id", default)]
    pub id: DocumentId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub comments: Vec<Ref<EntComment>>,
    #[serde(skip)]
    is_new: bool,
}

impl EntBlogPost {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.to_string(),
            content: content.to_string(),
            comments: Vec::new(),
            is_new: true,
        }
    }
}

impl Entity for EntBlogPost {
    const ENTITY_TYPE: EntityType = EntityType::BlogPost;
    type Schema = BlogPostSchema;

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
