// User Entity Schema - validated name, embedded posts and cascading blog post references

use crate::ent_framework::{
    EdgeConstraint, EntSchema, FieldDefinition, FieldType, FieldValidator, VirtualDefinition,
};
use crate::entities::{EmbeddedType, EntityType};

pub struct UserSchema;

impl EntSchema for UserSchema {
    fn entity_type() -> EntityType {
        EntityType::User
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar("name", FieldType::String)
                .validate(FieldValidator::Required("Name is required.".to_string()))
                .validate(FieldValidator::MinLength(
                    2,
                    "Name must be longer than 1 character.".to_string(),
                )),
            FieldDefinition::scalar("likes", FieldType::Number),
            FieldDefinition::embedded_list("posts", EmbeddedType::Post),
            // Removing a user instance removes the blog posts it wrote
            FieldDefinition::reference_list("blogPosts", EntityType::BlogPost)
                .constraint(EdgeConstraint::DeleteCascade),
        ]
    }

    fn virtuals() -> Vec<VirtualDefinition> {
        vec![VirtualDefinition::new("postCount", "posts")]
    }
}
