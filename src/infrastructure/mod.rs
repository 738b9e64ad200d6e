// Storage infrastructure: query language, storage client contract and backends

pub mod database;        // Storage client contract and connect()
pub mod memory_database; // Process-local backend
pub mod query;           // Filter and update documents
pub mod sqlite_database; // sqlx-backed SQLite backend

pub use database::{
    connect, DatabaseInterface, DeleteResult, ReturnDocument, UpdateOptions, UpdateResult,
};
pub use memory_database::InMemoryDatabase;
pub use query::{Filter, Update};
pub use sqlite_database::SqliteDatabase;
