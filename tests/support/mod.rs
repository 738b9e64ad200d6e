#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use users_db::core::{Document, DocumentId};
use users_db::ent_framework::EntContext;
use users_db::entities::EntityType;
use users_db::error::{AppError, AppResult};
use users_db::infrastructure::{
    DatabaseInterface, DeleteResult, Filter, InMemoryDatabase, ReturnDocument, Update,
    UpdateOptions, UpdateResult,
};

/// Fresh in-memory context with every collection dropped
pub async fn setup() -> EntContext {
    let ctx = EntContext::connect("memory://users_test").await.unwrap();
    for entity_type in EntityType::all() {
        ctx.drop_collection(entity_type).await.unwrap();
    }
    ctx
}

/// Storage client that refuses deletes in one collection
pub struct FailingDeletes {
    inner: InMemoryDatabase,
    collection: &'static str,
}

impl FailingDeletes {
    pub fn context(collection: &'static str) -> EntContext {
        let db = FailingDeletes {
            inner: InMemoryDatabase::new("failing_deletes"),
            collection,
        };
        EntContext::new(Arc::new(db)).unwrap()
    }

    fn refuse(&self, collection: &str) -> AppResult<()> {
        if collection == self.collection {
            return Err(AppError::DatabaseError(format!(
                "deletes in {} are disabled",
                collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseInterface for FailingDeletes {
    fn name(&self) -> &str {
        "failing_deletes"
    }

    async fn insert_document(&self, collection: &str, doc: Document) -> AppResult<()> {
        self.inner.insert_document(collection, doc).await
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: DocumentId,
        doc: Document,
    ) -> AppResult<bool> {
        self.inner.replace_document(collection, id, doc).await
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>> {
        self.inner.find_documents(collection, filter, limit).await
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> AppResult<UpdateResult> {
        self.inner
            .update_documents(collection, filter, update, options)
            .await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        return_document: ReturnDocument,
    ) -> AppResult<Option<Document>> {
        self.inner
            .find_one_and_update(collection, filter, update, return_document)
            .await
    }

    async fn delete_documents(
        &self,
        collection: &str,
        filter: &Filter,
        just_once: bool,
    ) -> AppResult<DeleteResult> {
        self.refuse(collection)?;
        self.inner
            .delete_documents(collection, filter, just_once)
            .await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Option<Document>> {
        self.refuse(collection)?;
        self.inner.find_one_and_delete(collection, filter).await
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> AppResult<u64> {
        self.inner.count_documents(collection, filter).await
    }

    async fn drop_collection(&self, collection: &str) -> AppResult<bool> {
        self.inner.drop_collection(collection).await
    }

    async fn health_check(&self) -> AppResult<()> {
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
