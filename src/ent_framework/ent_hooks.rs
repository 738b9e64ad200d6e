// Ent Hooks System - middleware run around entity saves and instance removes

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::document::value_id;
use crate::core::{Document, DocumentId};
use crate::ent_framework::ent_schema::SchemaRegistry;
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::DatabaseInterface;
use crate::infrastructure::query::Filter;

/// Hook context containing mutation information
#[derive(Debug, Clone)]
pub struct HookContext {
    pub entity_type: EntityType,
    pub entity_id: DocumentId,
    pub operation: HookOperation,
    /// Document about to be written (save) or the instance being removed
    pub document: Document,
    pub metadata: HashMap<String, Value>,
}

impl HookContext {
    pub fn new(
        entity_type: EntityType,
        entity_id: DocumentId,
        operation: HookOperation,
        document: Document,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            operation,
            document,
            metadata: HashMap::new(),
        }
    }
}

/// Types of operations that can trigger hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOperation {
    Save,
    /// Instance remove only; filter deletes never run hooks
    Remove,
}

/// Hook execution timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

/// Trait for implementing entity hooks
#[async_trait]
pub trait EntHook: Send + Sync {
    /// Execute the hook logic
    async fn execute(&self, db: &dyn DatabaseInterface, ctx: &mut HookContext) -> AppResult<()>;

    /// Get hook name for debugging
    fn name(&self) -> &str;

    /// Get supported operations
    fn operations(&self) -> Vec<HookOperation>;

    /// Get hook timing
    fn timing(&self) -> HookTiming;
}

/// Hook registry for managing entity hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<EntityType, Vec<Box<dyn EntHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for an entity type
    pub fn register_hook(&mut self, entity_type: EntityType, hook: Box<dyn EntHook>) {
        self.hooks.entry(entity_type).or_default().push(hook);
    }

    pub fn hook_names(&self, entity_type: EntityType) -> Vec<&str> {
        self.hooks
            .get(&entity_type)
            .map(|hooks| hooks.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }

    /// Execute all applicable hooks for an operation, in registration order.
    ///
    /// The first failing hook stops the chain; its error is returned as is.
    pub async fn execute_hooks(
        &self,
        operation: HookOperation,
        timing: HookTiming,
        db: &dyn DatabaseInterface,
        ctx: &mut HookContext,
    ) -> AppResult<()> {
        if let Some(hooks) = self.hooks.get(&ctx.entity_type) {
            for hook in hooks {
                if hook.operations().contains(&operation) && hook.timing() == timing {
                    debug!(
                        "Running hook '{}' for {:?} {} {}",
                        hook.name(),
                        operation,
                        ctx.entity_type,
                        ctx.entity_id
                    );
                    hook.execute(db, ctx).await?;
                }
            }
        }
        Ok(())
    }
}

/// Cascade delete hook - removes every entity a reference field points at
/// before the owning instance is removed
pub struct CascadeDeleteHook {
    field: String,
    target: EntityType,
}

impl CascadeDeleteHook {
    pub fn new(field: &str, target: EntityType) -> Self {
        Self {
            field: field.to_string(),
            target,
        }
    }

    fn referenced_ids(&self, doc: &Document) -> Vec<DocumentId> {
        match doc.get(&self.field) {
            Some(Value::Array(items)) => items.iter().filter_map(value_id).collect(),
            Some(value) => value_id(value).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl EntHook for CascadeDeleteHook {
    async fn execute(&self, db: &dyn DatabaseInterface, ctx: &mut HookContext) -> AppResult<()> {
        let ids = self.referenced_ids(&ctx.document);
        if ids.is_empty() {
            return Ok(());
        }

        let result = db
            .delete_documents(self.target.collection(), &Filter::id_in(ids), false)
            .await
            .map_err(|e| {
                warn!(
                    "Cascade from {} {} through '{}' failed: {}",
                    ctx.entity_type, ctx.entity_id, self.field, e
                );
                AppError::CascadeFailure {
                    entity: format!("{} {}", ctx.entity_type, ctx.entity_id),
                    source: Box::new(e),
                }
            })?;

        debug!(
            "Cascade removed {} {} documents for {} {}",
            result.deleted, self.target, ctx.entity_type, ctx.entity_id
        );
        ctx.metadata.insert(
            format!("cascade.{}", self.field),
            Value::from(result.deleted),
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "cascade_delete_hook"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Remove]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

/// Audit log hook - traces completed saves and removes
pub struct AuditLogHook;

#[async_trait]
impl EntHook for AuditLogHook {
    async fn execute(&self, _db: &dyn DatabaseInterface, ctx: &mut HookContext) -> AppResult<()> {
        debug!(
            entity = %ctx.entity_type,
            id = %ctx.entity_id,
            operation = ?ctx.operation,
            "audit"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "audit_log_hook"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Save, HookOperation::Remove]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::After
    }
}

/// Create default hook registry: a cascade hook for every reference declared
/// with `DeleteCascade`, plus audit logging for every entity
pub fn create_default_hook_registry(schemas: &SchemaRegistry) -> HookRegistry {
    let mut registry = HookRegistry::new();

    for entity_type in schemas.entity_types() {
        for field in schemas.get_fields(entity_type).unwrap_or(&[]) {
            if let (true, Some(target)) = (field.cascades_on_delete(), field.reference_target()) {
                registry.register_hook(
                    entity_type,
                    Box::new(CascadeDeleteHook::new(&field.name, target)),
                );
            }
        }
        registry.register_hook(entity_type, Box::new(AuditLogHook));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_database::InMemoryDatabase;
    use crate::schemas::create_schema_registry;
    use serde_json::json;

    #[test]
    fn test_default_registry_cascades_user_blog_posts_only() {
        let registry = create_default_hook_registry(&create_schema_registry());
        assert_eq!(
            registry.hook_names(EntityType::User),
            vec!["cascade_delete_hook", "audit_log_hook"]
        );
        assert_eq!(registry.hook_names(EntityType::BlogPost), vec!["audit_log_hook"]);
        assert_eq!(registry.hook_names(EntityType::Comment), vec!["audit_log_hook"]);
    }

    #[tokio::test]
    async fn test_cascade_hook_deletes_referenced_documents() {
        let db = InMemoryDatabase::new("hooks");
        let kept = DocumentId::new();
        let doomed = DocumentId::new();
        for id in [kept, doomed] {
            let doc = json!({"_id": id.to_string(), "title": "T", "content": "C"});
            db.insert_document("blogposts", doc.as_object().cloned().unwrap())
                .await
                .unwrap();
        }

        let owner = json!({"_id": DocumentId::new().to_string(), "blogPosts": [doomed.to_string()]});
        let mut ctx = HookContext::new(
            EntityType::User,
            DocumentId::new(),
            HookOperation::Remove,
            owner.as_object().cloned().unwrap(),
        );
        CascadeDeleteHook::new("blogPosts", EntityType::BlogPost)
            .execute(&db, &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.metadata["cascade.blogPosts"], json!(1));
        assert!(db
            .find_one_document("blogposts", &Filter::id(doomed))
            .await
            .unwrap()
            .is_none());
        assert!(db
            .find_one_document("blogposts", &Filter::id(kept))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_cascade_failure_wraps_storage_error() {
        let db = InMemoryDatabase::new("hooks");
        db.close().await;

        let owner = json!({"blogPosts": [DocumentId::new().to_string()]});
        let mut ctx = HookContext::new(
            EntityType::User,
            DocumentId::new(),
            HookOperation::Remove,
            owner.as_object().cloned().unwrap(),
        );
        let err = CascadeDeleteHook::new("blogPosts", EntityType::BlogPost)
            .execute(&db, &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CascadeFailure { .. }));
    }
}
