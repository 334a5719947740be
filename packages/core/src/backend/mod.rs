//! Database backend interface
//!
//! Every reconciliation source (Sierra, Redshift, Envisionware) is reached
//! through the [`Backend`] trait so checks never depend on a concrete
//! driver. Handles are shared between checks and used in short
//! connect → query → close cycles.

pub mod mock;
pub mod mysql;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub use mock::{BackendCall, ScriptedBackend};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;

/// A single column value as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// One result row, columns in select order.
pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of a count-like column. Text is accepted because
    /// some drivers hand back aggregates as strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Unquoted rendering used for grouping keys and id lists.
    pub fn as_key(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Errors raised at the backend boundary.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{backend}: failed to connect: {source}")]
    Connect {
        backend: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{backend}: query failed: {source}")]
    Query {
        backend: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{backend}: failed to close connection: {source}")]
    Close {
        backend: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{backend}: query executed without an open connection")]
    NotConnected { backend: String },

    #[error("{backend}: cannot decode column '{column}': {source}")]
    Decode {
        backend: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{backend} unavailable: {message}")]
    Unavailable { backend: String, message: String },

    #[error("Unexpected result shape: {detail}")]
    UnexpectedShape { detail: String },
}

impl BackendError {
    pub fn unexpected_shape(detail: impl Into<String>) -> Self {
        Self::UnexpectedShape { detail: detail.into() }
    }
}

/// Connection-capable handle to one database.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in log lines and errors, e.g. "Redshift".
    fn name(&self) -> &str;

    /// Open a connection. Calling this while already connected is a no-op.
    async fn connect(&self) -> Result<(), BackendError>;

    /// Run a query on the open connection and return every row.
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>, BackendError>;

    /// Close the open connection, if any.
    async fn close_connection(&self) -> Result<(), BackendError>;
}

/// Run a single-value count query in its own connect → query → close
/// cycle. The connection is closed even when the query fails.
pub async fn record_count(backend: &dyn Backend, query: &str) -> Result<i64, BackendError> {
    backend.connect().await?;
    let result = backend.execute_query(query).await;
    let rows = close_after(backend, result).await?;
    scalar_count(&rows)
}

/// Close `backend` once a unit of work has finished and hand back its
/// result.
///
/// When both the work and the close fail, the work's error is returned and
/// the close error is only logged.
pub async fn close_after<T, E>(backend: &dyn Backend, fetched: Result<T, E>) -> Result<T, E>
where
    E: From<BackendError>,
{
    let closed = backend.close_connection().await;
    match (fetched, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!("Failed to close {} connection: {}", backend.name(), close_err);
            Err(err)
        }
    }
}

/// First column of the first row as an integer count.
pub fn scalar_count(rows: &[Row]) -> Result<i64, BackendError> {
    count_at(rows, 0)
}

/// Column `index` of the first row as an integer count.
pub fn count_at(rows: &[Row], index: usize) -> Result<i64, BackendError> {
    let value = rows
        .first()
        .and_then(|row| row.get(index))
        .ok_or_else(|| {
            BackendError::unexpected_shape(format!("expected a count in column {}", index))
        })?;

    value
        .as_i64()
        .ok_or_else(|| BackendError::unexpected_shape(format!("non-integer count {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_count_reads_first_cell() {
        let rows = vec![vec![Value::Int(42)]];
        assert_eq!(scalar_count(&rows).unwrap(), 42);
    }

    #[test]
    fn scalar_count_accepts_numeric_text() {
        let rows = vec![vec![Value::Text("17".into())]];
        assert_eq!(scalar_count(&rows).unwrap(), 17);
    }

    #[test]
    fn scalar_count_rejects_empty_results() {
        let err = scalar_count(&[]).unwrap_err();
        assert!(matches!(err, BackendError::UnexpectedShape { .. }));
    }

    #[test]
    fn count_at_reads_later_columns() {
        let rows = vec![vec![Value::Int(11), Value::Int(9)]];
        assert_eq!(count_at(&rows, 1).unwrap(), 9);
        assert!(count_at(&rows, 2).is_err());
    }

    #[test]
    fn display_quotes_text_only() {
        assert_eq!(Value::from("aa").to_string(), "'aa'");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("aa").as_key(), "aa");
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[tokio::test]
    async fn record_count_closes_after_query_failure() {
        let backend = ScriptedBackend::new("Sierra")
            .with_error(BackendError::Unavailable {
                backend: "Sierra".into(),
                message: "down".into(),
            });

        assert!(record_count(&backend, "SELECT 1;").await.is_err());
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.close_count(), 1);
    }

    fn unavailable(message: &str) -> BackendError {
        BackendError::Unavailable {
            backend: "Redshift".into(),
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn query_error_wins_over_close_error() {
        let backend = ScriptedBackend::new("Redshift")
            .with_error(unavailable("relation does not exist"))
            .with_close_error(unavailable("broken pipe"));

        let err = record_count(&backend, "SELECT 1;").await.unwrap_err();

        assert!(err.to_string().contains("relation does not exist"));
        assert_eq!(backend.close_count(), 1);
    }

    #[tokio::test]
    async fn close_error_surfaces_after_successful_query() {
        let backend = ScriptedBackend::new("Redshift")
            .with_count(3)
            .with_close_error(unavailable("broken pipe"));

        let err = record_count(&backend, "SELECT 1;").await.unwrap_err();

        assert!(err.to_string().contains("broken pipe"));
    }
}
