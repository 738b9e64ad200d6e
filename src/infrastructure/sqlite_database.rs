use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::{document_id, Document, DocumentId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{
    DatabaseInterface, DeleteResult, ReturnDocument, UpdateOptions, UpdateResult,
};
use crate::infrastructure::query::{Filter, Update};

/// SQLite implementation of the document store.
///
/// Each document is one row holding its JSON body. Filters are evaluated in
/// process after loading a collection; writes are serialized by `write_lock`
/// and run inside a transaction.
pub struct SqliteDatabase {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

fn sql_error(action: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(format!("Failed to {}: {}", action, e))
}

fn decode(body: &str) -> AppResult<Document> {
    match serde_json::from_str(body)? {
        serde_json::Value::Object(doc) => Ok(doc),
        other => Err(AppError::Serialization(format!(
            "stored document is not an object: {}",
            other
        ))),
    }
}

impl SqliteDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        // every connection to sqlite::memory: is a separate database
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqlitePoolOptions::new();
        options = if in_memory {
            options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(max_connections.max(1))
        };

        let pool = options.connect(url).await.map_err(|e| {
            AppError::Connection(format!("Failed to connect to SQLite at {}: {}", url, e))
        })?;

        let db = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        db.initialize().await?;
        Ok(db)
    }

    /// Create the documents table if it does not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                UNIQUE (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| sql_error("create documents table", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| sql_error("create collection index", e))?;

        Ok(())
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.pool.is_closed() {
            return Err(AppError::Connection("SQLite pool is closed".to_string()));
        }
        Ok(())
    }

    async fn load(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Vec<Document>> {
        let rows = match filter.as_id() {
            Some(id) => sqlx::query(
                "SELECT body FROM documents WHERE collection = ? AND id = ? ORDER BY seq",
            )
            .bind(collection)
            .bind(id.to_string())
            .fetch_all(&mut **tx)
            .await,
            None => sqlx::query("SELECT body FROM documents WHERE collection = ? ORDER BY seq")
                .bind(collection)
                .fetch_all(&mut **tx)
                .await,
        }
        .map_err(|e| sql_error(&format!("load collection {}", collection), e))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row
                .try_get("body")
                .map_err(|e| sql_error("read document body", e))?;
            let doc = decode(&body)?;
            if filter.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn write_body(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        doc: &Document,
    ) -> AppResult<u64> {
        let id = document_id(doc).ok_or_else(|| {
            AppError::BadRequest(format!("document in {} has no _id", collection))
        })?;
        let body = serde_json::to_string(doc)?;
        let result = sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(body)
            .bind(collection)
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| sql_error(&format!("update document {}", id), e))?;
        Ok(result.rows_affected())
    }

    async fn delete_ids(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        ids: &[DocumentId],
    ) -> AppResult<u64> {
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id.to_string())
                .execute(&mut **tx)
                .await
                .map_err(|e| sql_error(&format!("delete document {}", id), e))?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.ensure_open()?;
        self.pool
            .begin()
            .await
            .map_err(|e| sql_error("begin transaction", e))
    }
}

#[async_trait]
impl DatabaseInterface for SqliteDatabase {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_document(&self, collection: &str, doc: Document) -> AppResult<()> {
        self.ensure_open()?;
        let id = document_id(&doc).ok_or_else(|| {
            AppError::BadRequest(format!("document inserted into {} has no _id", collection))
        })?;
        let body = serde_json::to_string(&doc)?;

        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id.to_string())
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| sql_error(&format!("insert document {} into {}", id, collection), e))?;
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
        let body = serde_json::to_string(&doc)?;

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(body)
            .bind(collection)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| sql_error(&format!("replace document {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>> {
        let mut tx = self.begin().await?;
        let mut docs = Self::load(&mut tx, collection, filter).await?;
        tx.commit()
            .await
            .map_err(|e| sql_error("commit read", e))?;

        if let Some(limit) = limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> AppResult<UpdateResult> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;
        let mut matched = Self::load(&mut tx, collection, filter).await?;
        if options.is_just_once() {
            matched.truncate(1);
        }

        let mut result = UpdateResult::default();
        for mut doc in matched {
            result.matched += 1;
            if update.apply(&mut doc)? {
                Self::write_body(&mut tx, collection, &doc).await?;
                result.modified += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| sql_error("commit update", e))?;
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
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;
        let before = match Self::load(&mut tx, collection, filter).await?.into_iter().next() {
            Some(doc) => doc,
            None => return Ok(None),
        };

        let mut after = before.clone();
        if update.apply(&mut after)? {
            Self::write_body(&mut tx, collection, &after).await?;
        }
        tx.commit()
            .await
            .map_err(|e| sql_error("commit update", e))?;

        Ok(Some(match return_document {
            ReturnDocument::Before => before,
            ReturnDocument::After => after,
        }))
    }

    async fn delete_documents(
        &self,
        collection: &str,
        filter: &Filter,
        just_once: bool,
    ) -> AppResult<DeleteResult> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;
        let mut ids: Vec<DocumentId> = Self::load(&mut tx, collection, filter)
            .await?
            .iter()
            .filter_map(document_id)
            .collect();
        if just_once {
            ids.truncate(1);
        }

        let deleted = Self::delete_ids(&mut tx, collection, &ids).await?;
        tx.commit()
            .await
            .map_err(|e| sql_error("commit delete", e))?;
        debug!("Deleted {} documents from {}", deleted, collection);
        Ok(DeleteResult { deleted })
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Option<Document>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;
        let doc = match Self::load(&mut tx, collection, filter).await?.into_iter().next() {
            Some(doc) => doc,
            None => return Ok(None),
        };

        if let Some(id) = document_id(&doc) {
            Self::delete_ids(&mut tx, collection, &[id]).await?;
        }
        tx.commit()
            .await
            .map_err(|e| sql_error("commit delete", e))?;
        Ok(Some(doc))
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> AppResult<u64> {
        if *filter == Filter::All {
            self.ensure_open()?;
            let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM documents WHERE collection = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .and_then(|row| row.try_get("n"))
                .map_err(|e| sql_error(&format!("count {}", collection), e))?;
            return Ok(count as u64);
        }
        Ok(self.find_documents(collection, filter, None).await?.len() as u64)
    }

    async fn drop_collection(&self, collection: &str) -> AppResult<bool> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(|e| sql_error(&format!("drop collection {}", collection), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> AppResult<()> {
        self.ensure_open()?;
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| sql_error("run health check", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
