//! Fixtures shared by the check unit tests.

use std::sync::Arc;

use chrono::NaiveDate;

use super::sink::MemorySink;
use crate::backend::ScriptedBackend;
use crate::context::RunContext;

pub const SUFFIX: &str = "_test_redshift_db";

/// A Wednesday.
pub fn may_31() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 5, 31).unwrap()
}

pub fn context(extended: bool) -> Arc<RunContext> {
    context_on(may_31(), extended)
}

pub fn context_on(run_date: NaiveDate, extended: bool) -> Arc<RunContext> {
    Arc::new(RunContext::new(run_date, SUFFIX, extended))
}

pub fn sink() -> Arc<MemorySink> {
    Arc::new(MemorySink::new())
}

pub fn redshift() -> ScriptedBackend {
    ScriptedBackend::new("Redshift")
}

pub fn sierra() -> ScriptedBackend {
    ScriptedBackend::new("Sierra")
}
