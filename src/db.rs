//! The database collaborator boundary.
//!
//! The benchmark core only requires a synchronous connection that can run
//! parameterized statements, return rows, and delimit transactions, and
//! that surfaces isolation conflicts as a distinguishable, retryable error.
//! Concurrency control over contended rows (district order counters, stock
//! quantities) is the tested database's job; the engine's job is to retry.

use thiserror::Error;

/// Errors surfaced by the database collaborator.
#[derive(Debug, Error)]
pub enum DbError {
    /// A serialization or lock conflict. Safe to retry the whole
    /// transaction with freshly drawn parameters.
    #[error("transaction conflict: {0}")]
    Conflict(String),
    /// Any other statement or connection failure.
    #[error("database error: {0}")]
    Failed(String),
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}

/// A single parameter or result column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        v.map(Value::Int).unwrap_or(Value::Null)
    }
}

/// One result row.
pub type Row = Vec<Value>;

/// Typed column accessors for result rows.
pub trait RowExt {
    /// Column as a non-null integer.
    fn int(&self, idx: usize) -> Result<i64, DbError>;
    /// Column as a nullable integer.
    fn opt_int(&self, idx: usize) -> Result<Option<i64>, DbError>;
    /// Column as non-null text.
    fn text(&self, idx: usize) -> Result<&str, DbError>;
}

impl RowExt for Row {
    fn int(&self, idx: usize) -> Result<i64, DbError> {
        match self.get(idx) {
            Some(Value::Int(v)) => Ok(*v),
            other => Err(DbError::Failed(format!(
                "column {idx}: expected integer, got {other:?}"
            ))),
        }
    }

    fn opt_int(&self, idx: usize) -> Result<Option<i64>, DbError> {
        match self.get(idx) {
            Some(Value::Int(v)) => Ok(Some(*v)),
            Some(Value::Null) => Ok(None),
            other => Err(DbError::Failed(format!(
                "column {idx}: expected nullable integer, got {other:?}"
            ))),
        }
    }

    fn text(&self, idx: usize) -> Result<&str, DbError> {
        match self.get(idx) {
            Some(Value::Text(v)) => Ok(v),
            other => Err(DbError::Failed(format!(
                "column {idx}: expected text, got {other:?}"
            ))),
        }
    }
}

/// A synchronous database connection.
pub trait Connection: Send {
    /// Executes a parameterized statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, DbError>;

    /// Runs a parameterized query and returns all rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    fn begin(&mut self) -> Result<(), DbError>;
    fn commit(&mut self) -> Result<(), DbError>;
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Runs a query expected to yield at most one row.
    fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>, DbError> {
        Ok(self.query(sql, params)?.into_iter().next())
    }
}

/// Hands out one connection per worker.
pub trait Database: Sync {
    type Conn: Connection;

    fn connect(&self) -> Result<Self::Conn, DbError>;
}
