//! PostgreSQL access layer for Ostrov
//!
//! Executes caller-supplied SQL on a pooled connection, one transaction
//! per call, and maps result rows to and from typed records.
//! No query building, no migrations: the schema belongs to the caller.

pub mod client;
pub mod model;
pub mod row;

pub use client::*;
pub use model::*;
pub use row::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Row not found")]
    RowNotFound,

    #[error("Query references a table that does not exist")]
    WrongTableNameQuery,

    #[error("Insert query contains other operations")]
    WrongInsertQuery,

    #[error("Row is missing fields: {}", .0.join(", "))]
    NotEnoughData(Vec<String>),

    #[error("Database is not connected")]
    NotConnected,

    #[error("Field {field} expects {expected}, got {found}")]
    WrongFieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Column {column} has unsupported type {type_name}")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// SQLSTATE for `undefined_table`.
pub(crate) const UNDEFINED_TABLE: &str = "42P01";

impl DbError {
    /// Translate a driver error raised while a statement executes.
    ///
    /// Only `undefined_table` has a domain meaning; everything else
    /// passes through untouched.
    pub(crate) fn from_statement(err: sqlx::Error) -> Self {
        let undefined_table = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == UNDEFINED_TABLE);

        if undefined_table {
            DbError::WrongTableNameQuery
        } else {
            DbError::Database(err)
        }
    }
}
