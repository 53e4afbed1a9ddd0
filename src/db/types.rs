//! Shared type definitions for the persistence layer.

use thiserror::Error;

/// Errors specific to store operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Stored schedule items are not valid JSON: {0}")]
    CorruptItems(#[from] serde_json::Error),

    #[error("Stored timestamp is not RFC 3339: {0}")]
    CorruptTimestamp(#[from] chrono::ParseError),

    #[error("No flair with id {0}")]
    FlairNotFound(String),
}
