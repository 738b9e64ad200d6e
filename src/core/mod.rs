// Core types shared by the storage layer and the entity framework

pub mod document;
pub mod strong_types;

pub use document::{document_id, Document, ID_FIELD};
pub use strong_types::{DocumentId, Timestamp};
