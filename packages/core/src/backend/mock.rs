//! Scripted backend for tests.
//!
//! Responses are handed out in order, one per `execute_query` call, and
//! every call is recorded so tests can assert on the exact
//! connect/query/close sequence a check performed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Backend, BackendError, Row, Value};

/// One recorded interaction with a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Connect,
    Query(String),
    Close,
}

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<Vec<Row>, BackendError>>,
    fallback: Option<Vec<Row>>,
    close_error: Option<BackendError>,
    connected: bool,
    calls: Vec<BackendCall>,
}

pub struct ScriptedBackend {
    name: String,
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(Script::default()),
        }
    }

    /// Queue one result set.
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.lock().responses.push_back(Ok(rows));
        self
    }

    /// Queue several result sets, in order.
    pub fn with_responses<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = Vec<Row>>,
    {
        {
            let mut script = self.lock();
            script.responses.extend(responses.into_iter().map(Ok));
        }
        self
    }

    /// Queue a single-cell count result.
    pub fn with_count(self, count: i64) -> Self {
        self.with_rows(count_rows(count))
    }

    /// Queue a failing query.
    pub fn with_error(self, error: BackendError) -> Self {
        self.lock().responses.push_back(Err(error));
        self
    }

    /// Fail the next `close_connection` call. The connection is still
    /// dropped.
    pub fn with_close_error(self, error: BackendError) -> Self {
        self.lock().close_error = Some(error);
        self
    }

    /// Rows returned once the queue is exhausted.
    pub fn with_fallback(self, rows: Vec<Row>) -> Self {
        self.lock().fallback = Some(rows);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Query(query) => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.count(&BackendCall::Connect)
    }

    pub fn close_count(&self) -> usize {
        self.count(&BackendCall::Close)
    }

    pub fn query_count(&self) -> usize {
        self.queries().len()
    }

    /// `true` when no call of any kind reached this backend.
    pub fn untouched(&self) -> bool {
        self.lock().calls.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn count(&self, wanted: &BackendCall) -> usize {
        self.lock().calls.iter().filter(|call| *call == wanted).count()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), BackendError> {
        let mut script = self.lock();
        script.calls.push(BackendCall::Connect);
        script.connected = true;
        Ok(())
    }

    async fn execute_query(&self, query: &str) -> Result<Vec<Row>, BackendError> {
        let mut script = self.lock();
        script.calls.push(BackendCall::Query(query.to_string()));

        if !script.connected {
            return Err(BackendError::NotConnected {
                backend: self.name.clone(),
            });
        }

        match script.responses.pop_front() {
            Some(response) => response,
            None => script.fallback.clone().ok_or_else(|| BackendError::Unavailable {
                backend: self.name.clone(),
                message: format!("no scripted response for query: {}", query),
            }),
        }
    }

    async fn close_connection(&self) -> Result<(), BackendError> {
        let mut script = self.lock();
        script.calls.push(BackendCall::Close);
        script.connected = false;
        match script.close_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A result set holding a single count.
pub fn count_rows(count: i64) -> Vec<Row> {
    vec![vec![Value::Int(count)]]
}

/// A result set with one single-column row per value.
pub fn single_column<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Vec<Row> {
    values.into_iter().map(|value| vec![value.into()]).collect()
}
