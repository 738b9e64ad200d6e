use crate::ent_framework::{EntSchema, FieldDefinition, FieldType};
use crate::entities::EntityType;

pub struct BlogPostSchema;

impl EntSchema for BlogPostSchema {
    fn entity_type() -> EntityType {
        EntityType::BlogPost
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar("title", FieldType::String),
            FieldDefinition::scalar("content", FieldType::String),
            FieldDefinition::reference_list("comments", EntityType::Comment),
        ]
    }
}
