// Embedded Post Schema - never stored on its own

use crate::ent_framework::{EmbeddedSchema, FieldDefault, FieldDefinition, FieldType};
use crate::entities::EmbeddedType;

pub struct PostSchema;

impl EmbeddedSchema for PostSchema {
    fn embedded_type() -> EmbeddedType {
        EmbeddedType::Post
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar("url", FieldType::String),
            FieldDefinition::scalar("createdAt", FieldType::Date).default_to(FieldDefault::Now),
        ]
    }
}
