//! MySQL client used for the Envisionware PC reservation database.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row as _, TypeInfo};
use tokio::sync::Mutex;

use super::{Backend, BackendError, Row, Value};

pub struct MySqlClient {
    name: String,
    options: MySqlConnectOptions,
    connection: Mutex<Option<MySqlConnection>>,
}

impl MySqlClient {
    pub fn new(
        name: impl Into<String>,
        host: &str,
        port: u16,
        database: &str,
        user: &str,
        password: &str,
    ) -> Self {
        let options = MySqlConnectOptions::new()
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
impl Backend for MySqlClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), BackendError> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        tracing::debug!("Connecting to {}", self.name);
        let connection = MySqlConnection::connect_with(&self.options)
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

fn decode_row(backend: &str, row: &MySqlRow) -> Result<Row, BackendError> {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            let type_name = column.type_info().name();
            let decoded = match type_name {
                "BOOLEAN" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::Bool)),
                "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
                    .try_get_unchecked::<Option<i64>, _>(index)
                    .map(|v| v.map(Value::Int)),
                name if name.ends_with("UNSIGNED") => row
                    .try_get_unchecked::<Option<u64>, _>(index)
                    .map(|v| v.map(|n| Value::Int(n as i64))),
                "FLOAT" | "DOUBLE" => row
                    .try_get_unchecked::<Option<f64>, _>(index)
                    .map(|v| v.map(Value::Float)),
                "DATE" => row.try_get::<Option<NaiveDate>, _>(index).map(|v| v.map(Value::Date)),
                "DATETIME" | "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(index)
                    .map(|v| v.map(Value::Timestamp)),
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
