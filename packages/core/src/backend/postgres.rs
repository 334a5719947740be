//! Postgres-wire client used for Sierra and Redshift.
//!
//! Queries are sent as plain text with no bind parameters, so sqlx uses the
//! simple query protocol and every column arrives in text format. Columns
//! with a type we don't model (NUMERIC, arrays, ...) fall back to their raw
//! text.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row as _, TypeInfo};
use tokio::sync::Mutex;

use super::{Backend, BackendError, Row, Value};

pub struct PostgresClient {
    name: String,
    options: PgConnectOptions,
    connection: Mutex<Option<PgConnection>>,
}

impl PostgresClient {
    pub fn new(
        name: impl Into<String>,
        host: &str,
        port: u16,
        database: &str,
        user: &str,
        password: &str,
    ) -> Self {
        let options = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database)
            .username(user)
            .password(password);

        Self {
            name: name.into(),
            options,
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Backend for PostgresClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), BackendError> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        tracing::debug!("Connecting to {}", self.name);
        let connection = PgConnection::connect_with(&self.options)
            .await
            .map_err(|source| BackendError::Connect {
                backend: self.name.clone(),
                source,
            })?;
        *guard = Some(connection);
        Ok(())
    }

    async fn execute_query(&self, query: &str) -> Result<Vec<Row>, BackendError> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or_else(|| BackendError::NotConnected {
            backend: self.name.clone(),
        })?;

        tracing::debug!("Querying {}: {}", self.name, query.trim());
        let rows = connection
            .fetch_all(query)
            .await
            .map_err(|source| BackendError::Query {
                backend: self.name.clone(),
                source,
            })?;

        rows.iter().map(|row| decode_row(&self.name, row)).collect()
    }

    async fn close_connection(&self) -> Result<(), BackendError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.take() {
            tracing::debug!("Closing {} connection", self.name);
            connection.close().await.map_err(|source| BackendError::Close {
                backend: self.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn decode_row(backend: &str, row: &PgRow) -> Result<Row, BackendError> {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            let decoded = match column.type_info().name() {
                "INT2" => row
                    .try_get::<Option<i16>, _>(index)
                    .map(|v| v.map(|n| Value::Int(n.into()))),
                "INT4" => row
                    .try_get::<Option<i32>, _>(index)
                    .map(|v| v.map(|n| Value::Int(n.into()))),
                "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::Int)),
                "FLOAT4" => row
                    .try_get::<Option<f32>, _>(index)
                    .map(|v| v.map(|x| Value::Float(x.into()))),
                "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(|v| v.map(Value::Float)),
                "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::Bool)),
                "DATE" => row.try_get::<Option<NaiveDate>, _>(index).map(|v| v.map(Value::Date)),
                "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(index)
                    .map(|v| v.map(Value::Timestamp)),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<DateTime<Utc>>, _>(index)
                    .map(|v| v.map(|ts| Value::Timestamp(ts.naive_utc()))),
                _ => row
                    .try_get_unchecked::<Option<String>, _>(index)
                    .map(|v| v.map(Value::Text)),
            };

            decoded
                .map(|value| value.unwrap_or(Value::Null))
                .map_err(|source| BackendError::Decode {
                    backend: backend.to_string(),
                    column: column.name().to_string(),
                    source,
                })
        })
        .collect()
}
