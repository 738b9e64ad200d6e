// In-memory document store - process-local backend used by tests and the default config

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::{document_id, Document, DocumentId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{
    DatabaseInterface, DeleteResult, ReturnDocument, UpdateOptions, UpdateResult,
};
use crate::infrastructure::query::{Filter, Update};

/// Collections of JSON documents kept in insertion order.
///
/// Writes hold the store's write lock for the whole read-modify-write, so
/// `$inc` deltas from concurrent callers are never lost.
pub struct InMemoryDatabase {
    name: String,
    collections: RwLock<HashMap<String, Vec<Document>>>,
    closed: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collections: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::Connection(format!(
                "in-memory database '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }
}

/// Apply `update` to copies of the matched documents; nothing is written
/// unless every copy was updated successfully.
fn plan_updates(
    docs: &[Document],
    filter: &Filter,
    update: &Update,
    just_once: bool,
) -> AppResult<Vec<(usize, Document, bool)>> {
    let mut planned = Vec::new();
    for (index, doc) in docs.iter().enumerate() {
        if !filter.matches(doc) {
            continue;
        }
        let mut next = doc.clone();
        let modified = update.apply(&mut next)?;
        planned.push((index, next, modified));
        if just_once {
            break;
        }
    }
    Ok(planned)
}

#[async_trait]
impl DatabaseInterface for InMemoryDatabase {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_document(&self, collection: &str, doc: Document) -> AppResult<()> {
        self.ensure_open()?;
        let id = document_id(&doc).ok_or_else(|| {
            AppError::BadRequest(format!("document inserted into {} has no _id", collection))
        })?;

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| document_id(d) == Some(id)) {
            return Err(AppError::DatabaseError(format!(
                "E11000 duplicate key error collection: {} _id: {}",
                collection, id
            )));
        }
        docs.push(doc);
        debug!("Inserted document {} into {}", id, collection);
        Ok(())
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: DocumentId,
        doc: Document,
    ) -> AppResult<bool> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d) == Some(id)));

        match slot {
            Some(stored) => {
                *stored = doc;
                debug!("Replaced document {} in {}", id, collection);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>> {
        self.ensure_open()?;
        let collections = self.collections.read().await;
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        Ok(docs
            .iter()
            .filter(|d| filter.matches(d))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> AppResult<UpdateResult> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(UpdateResult::default()),
        };

        let planned = plan_updates(docs, filter, update, options.is_just_once())?;
        let mut result = UpdateResult::default();
        for (index, next, modified) in planned {
            result.matched += 1;
            if modified {
                result.modified += 1;
                docs[index] = next;
            }
        }
        debug!(
            "Updated {}/{} documents in {}",
            result.modified, result.matched, collection
        );
        Ok(result)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        return_document: ReturnDocument,
    ) -> AppResult<Option<Document>> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(None),
        };

        let (index, next, _) = match plan_updates(docs, filter, update, true)?.pop() {
            Some(planned) => planned,
            None => return Ok(None),
        };
        let before = std::mem::replace(&mut docs[index], next);
        Ok(Some(match return_document {
            ReturnDocument::Before => before,
            ReturnDocument::After => docs[index].clone(),
        }))
    }

    async fn delete_documents(
        &self,
        collection: &str,
        filter: &Filter,
        just_once: bool,
    ) -> AppResult<DeleteResult> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(DeleteResult::default()),
        };

        let mut deleted = 0u64;
        docs.retain(|d| {
            if (just_once && deleted > 0) || !filter.matches(d) {
                return true;
            }
            deleted += 1;
            false
        });
        debug!("Deleted {} documents from {}", deleted, collection);
        Ok(DeleteResult { deleted })
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Option<Document>> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(None),
        };

        Ok(docs
            .iter()
            .position(|d| filter.matches(d))
            .map(|index| docs.remove(index)))
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> AppResult<u64> {
        self.ensure_open()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> AppResult<bool> {
        self.ensure_open()?;
        Ok(self.collections.write().await.remove(collection).is_some())
    }

    async fn health_check(&self) -> AppResult<()> {
        self.ensure_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.collections.write().await.clear();
    }
}
