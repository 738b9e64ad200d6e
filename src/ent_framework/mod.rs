// Ent Framework - schemas, hooks, references and the Entity trait

pub mod context;
pub mod ent_hooks;
pub mod ent_schema;
pub mod ent_trait;
pub mod population;
pub mod reference;

// Re-export all ent framework types for convenience
pub use context::EntContext;
pub use ent_hooks::{
    create_default_hook_registry, AuditLogHook, CascadeDeleteHook, EntHook, HookContext,
    HookOperation, HookRegistry, HookTiming,
};
pub use ent_schema::*;
pub use ent_trait::Entity;
pub use population::{populate_document, PopulateSpec};
pub use reference::Ref;
