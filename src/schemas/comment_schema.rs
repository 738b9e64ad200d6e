use crate::ent_framework::{EntSchema, FieldDefinition, FieldType};
use crate::entities::EntityType;

pub struct CommentSchema;

impl EntSchema for CommentSchema {
    fn entity_type() -> EntityType {
        EntityType::Comment
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar("content", FieldType::String),
            // The authoring user
            FieldDefinition::reference("user", EntityType::User),
        ]
    }
}
