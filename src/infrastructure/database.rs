// Database Interface - storage client contract consumed by the entity framework
// Backends store schemaless JSON documents grouped in named collections

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{Document, DocumentId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::memory_database::InMemoryDatabase;
use crate::infrastructure::query::{Filter, Update};
use crate::infrastructure::sqlite_database::SqliteDatabase;

/// Options for filter-based updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    just_once: bool,
}

impl UpdateOptions {
    pub fn new(just_once: bool) -> Self {
        Self { just_once }
    }

    /// Update every matching document
    pub fn many() -> Self {
        Self::new(false)
    }

    /// Update only the first matching document
    pub fn just_once() -> Self {
        Self::new(true)
    }

    pub fn is_just_once(&self) -> bool {
        self.just_once
    }
}

/// Which version of a document find-and-modify operations hand back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: u64,
}

/// Storage client for document collections.
///
/// Every call is an independent request; callers needing ordering chain the
/// awaits themselves. Single-document writes are all-or-nothing.
#[async_trait]
pub trait DatabaseInterface: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    async fn insert_document(&self, collection: &str, doc: Document) -> AppResult<()>;

    /// Replace the stored body of `id`; `false` when no such document exists
    async fn replace_document(
        &self,
        collection: &str,
        id: DocumentId,
        doc: Document,
    ) -> AppResult<bool>;

    /// Matching documents in insertion order
    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>>;

    async fn find_one_document(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Option<Document>> {
        Ok(self
            .find_documents(collection, filter, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> AppResult<UpdateResult>;

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        return_document: ReturnDocument,
    ) -> AppResult<Option<Document>>;

    async fn delete_documents(
        &self,
        collection: &str,
        filter: &Filter,
        just_once: bool,
    ) -> AppResult<DeleteResult>;

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Option<Document>>;

    async fn count_documents(&self, collection: &str, filter: &Filter) -> AppResult<u64>;

    /// Remove a whole collection; `false` when it did not exist
    async fn drop_collection(&self, collection: &str) -> AppResult<bool>;

    async fn health_check(&self) -> AppResult<()>;

    /// Release the underlying connection; later calls fail with `Connection`
    async fn close(&self);
}

/// Open a storage client for `uri`.
///
/// `memory://<name>` gives a fresh process-local store, `sqlite:...` a SQLite
/// pool. Failures are logged once and returned; nothing is retried here.
pub async fn connect(uri: &str, max_connections: u32) -> AppResult<Arc<dyn DatabaseInterface>> {
    match open(uri, max_connections).await {
        Ok(db) => {
            info!("Good to go! Connected to {} store at {}", db.name(), uri);
            Ok(db)
        }
        Err(e) => {
            warn!("Warning: {}", e);
            Err(e)
        }
    }
}

async fn open(uri: &str, max_connections: u32) -> AppResult<Arc<dyn DatabaseInterface>> {
    let db: Arc<dyn DatabaseInterface> = if let Some(name) = uri.strip_prefix("memory://") {
        Arc::new(InMemoryDatabase::new(name))
    } else if uri.starts_with("sqlite:") {
        Arc::new(SqliteDatabase::connect(uri, max_connections).await?)
    } else {
        return Err(AppError::Connection(format!(
            "unsupported database uri '{}'",
            uri
        )));
    };

    db.health_check()
        .await
        .map_err(|e| AppError::Connection(format!("health check against {} failed: {}", uri, e)))?;
    Ok(db)
}
