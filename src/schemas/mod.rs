// Schema definitions module - centralized schema registry

pub mod blog_post_schema;
pub mod comment_schema;
pub mod post_schema;
pub mod user_schema;

use crate::ent_framework::{EmbeddedSchema, FieldDefinition, SchemaRegistry};
use crate::entities::EmbeddedType;

pub use blog_post_schema::BlogPostSchema;
pub use comment_schema::CommentSchema;
pub use post_schema::PostSchema;
pub use user_schema::UserSchema;

/// Initialize and register all entity schemas
pub fn create_schema_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();

    registry.register::<UserSchema>();
    registry.register::<BlogPostSchema>();
    registry.register::<CommentSchema>();

    registry
}

/// Field definitions of an embedded value type
pub fn embedded_fields(embedded: EmbeddedType) -> Vec<FieldDefinition> {
    match embedded {
        EmbeddedType::Post => PostSchema::fields(),
    }
}
