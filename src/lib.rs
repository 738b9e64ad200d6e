// Users document database - entity model, validation, references and cascades

// Ent Framework - schemas, hooks, population and the Entity trait
pub mod ent_framework;

// Core types and primitives
pub mod core;

// Storage infrastructure - query language and database backends
pub mod infrastructure;

// Schema Definitions - one per entity plus the embedded post
pub mod schemas;

// Entities - User, BlogPost, Comment and the embedded Post
pub mod entities;

// Common utilities
pub mod config;
pub mod data_seeder;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
