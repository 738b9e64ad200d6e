// Explicit connection handle threaded through every entity operation

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::ent_framework::ent_hooks::{create_default_hook_registry, HookRegistry};
use crate::ent_framework::ent_schema::SchemaRegistry;
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{self, DatabaseInterface};
use crate::schemas::create_schema_registry;

/// Storage client plus the schema and hook registries.
///
/// Created once at startup and cloned into whatever issues storage calls.
/// Clones share the same connection; `shutdown` closes it for all of them.
#[derive(Clone)]
pub struct EntContext {
    db: Arc<dyn DatabaseInterface>,
    schemas: Arc<SchemaRegistry>,
    hooks: Arc<HookRegistry>,
}

impl EntContext {
    /// Wrap an open storage client with the default schemas and hooks
    pub fn new(db: Arc<dyn DatabaseInterface>) -> AppResult<Self> {
        let schemas = checked_schemas()?;
        let hooks = create_default_hook_registry(&schemas);
        Ok(Self {
            db,
            schemas: Arc::new(schemas),
            hooks: Arc::new(hooks),
        })
    }

    /// Wrap a storage client with a caller-built hook registry
    pub fn with_hooks(db: Arc<dyn DatabaseInterface>, hooks: HookRegistry) -> AppResult<Self> {
        Ok(Self {
            db,
            schemas: Arc::new(checked_schemas()?),
            hooks: Arc::new(hooks),
        })
    }

    pub async fn connect(uri: &str) -> AppResult<Self> {
        Self::new(database::connect(uri, Config::default().database.max_connections).await?)
    }

    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let db = database::connect(&config.database.url, config.database.max_connections).await?;
        Self::new(db)
    }

    pub fn db(&self) -> &dyn DatabaseInterface {
        self.db.as_ref()
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Drop every document of an entity type
    pub async fn drop_collection(&self, entity_type: EntityType) -> AppResult<bool> {
        self.db.drop_collection(entity_type.collection()).await
    }

    pub async fn shutdown(&self) {
        info!("Closing {} store", self.db.name());
        self.db.close().await;
    }
}

fn checked_schemas() -> AppResult<SchemaRegistry> {
    let schemas = create_schema_registry();
    schemas
        .validate()
        .map_err(|errors| AppError::Configuration(errors.join("; ")))?;
    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_and_shutdown() {
        let ctx = EntContext::connect("memory://context").await.unwrap();
        assert_eq!(ctx.db().name(), "memory");
        assert!(!ctx.drop_collection(EntityType::User).await.unwrap());

        let clone = ctx.clone();
        ctx.shutdown().await;
        assert!(matches!(
            clone.db().health_check().await,
            Err(AppError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_connection_error() {
        let err = EntContext::connect("mongodb://localhost/users")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Connection(_)));
    }
}
