use thiserror::Error;

use crate::backend::BackendError;
use crate::services::site_cache::SiteCacheError;

/// Faults that stop a check before it finishes. Fired alarms are never
/// errors; they go to the sink.
#[derive(Error, Debug)]
pub enum AlarmError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    SiteCache(#[from] SiteCacheError),

    /// A row did not have the shape the check expects.
    #[error("{check}: malformed row: {detail}")]
    MalformedRow { check: &'static str, detail: String },
}

impl AlarmError {
    pub fn malformed_row(check: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedRow {
            check,
            detail: detail.into(),
        }
    }
}
