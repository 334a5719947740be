//! Weekly patron record reconciliation.
//!
//! The patron pollers run on Wednesday night, so this check only does work
//! when the run date is a Wednesday and then compares the preceding seven
//! days day by day.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, Backend, Row, Value};
use crate::context::RunContext;
use crate::queries::{redshift, sierra};

pub const NAME: &str = "patron_info";

const WINDOW_DAYS: i64 = 7;

type DailyCounts = BTreeMap<String, i64>;

pub struct PatronInfoAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    sierra: Arc<dyn Backend>,
    redshift: Arc<dyn Backend>,
}

impl PatronInfoAlarms {
    pub fn new(
        context: Arc<RunContext>,
        sink: Arc<dyn AlarmSink>,
        sierra: Arc<dyn Backend>,
        redshift: Arc<dyn Backend>,
    ) -> Self {
        Self {
            context,
            log: AlarmLog::new(NAME, sink),
            sierra,
            redshift,
        }
    }

    /// Run `new` then `deleted` on one connection to `backend`.
    async fn fetch_pair(
        backend: &dyn Backend,
        new_query: &str,
        deleted_query: &str,
    ) -> Result<(DailyCounts, DailyCounts), AlarmError> {
        backend.connect().await?;
        let fetched = async {
            let new = backend.execute_query(new_query).await?;
            let deleted = backend.execute_query(deleted_query).await?;
            Ok::<_, AlarmError>((new, deleted))
        }
        .await;
        let (new, deleted) = close_after(backend, fetched).await?;
        Ok((daily_counts(&new)?, daily_counts(&deleted)?))
    }
}

/// Collect `(day, count)` rows into a map keyed by ISO day.
fn daily_counts(rows: &[Row]) -> Result<DailyCounts, AlarmError> {
    rows.iter()
        .map(|row| match row.as_slice() {
            [day, count] => {
                let count = count.as_i64().ok_or_else(|| {
                    AlarmError::malformed_row(NAME, format!("non-integer count {}", count))
                })?;
                Ok((day_key(day), count))
            }
            other => Err(AlarmError::malformed_row(
                NAME,
                format!("expected (date, count), got {} columns", other.len()),
            )),
        })
        .collect()
}

fn day_key(value: &Value) -> String {
    match value {
        Value::Timestamp(ts) => ts.date().to_string(),
        other => other.as_key(),
    }
}

/// Union of days present on either side, sorted, with missing counts as 0.
fn paired_counts<'a>(
    source: &'a DailyCounts,
    warehouse: &'a DailyCounts,
) -> impl Iterator<Item = (&'a str, i64, i64)> + 'a {
    let mut days: Vec<&String> = source.keys().chain(warehouse.keys()).collect();
    days.sort();
    days.dedup();
    days.into_iter().map(move |day| {
        (
            day.as_str(),
            source.get(day).copied().unwrap_or(0),
            warehouse.get(day).copied().unwrap_or(0),
        )
    })
}

#[async_trait]
impl Alarm for PatronInfoAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        let end: NaiveDate = self.context.run_date();
        if end.weekday() != Weekday::Wed {
            tracing::debug!("Skipping patron info checks: {} is not a Wednesday", end);
            return Ok(());
        }

        let start = self.context.offset(-WINDOW_DAYS);
        tracing::info!("Patron Info: {} to {}", start, end);

        let (sierra_new, sierra_deleted) = Self::fetch_pair(
            self.sierra.as_ref(),
            &sierra::new_patrons(start, end),
            &sierra::deleted_patrons(start, end),
        )
        .await?;

        let table = self.context.table("patron_info");
        let (warehouse_new, warehouse_deleted) = Self::fetch_pair(
            self.redshift.as_ref(),
            &redshift::new_patrons(&table, start, end),
            &redshift::deleted_patrons(&table, start, end),
        )
        .await?;

        for (day, source_count, warehouse_count) in paired_counts(&sierra_new, &warehouse_new) {
            self.log.mismatch_on("Sierra new patron", &table, day, source_count, warehouse_count);
            self.log.no_records_found(
                "new patron",
                source_count,
                day,
                self.context.extended_checks_enabled(),
            );
        }

        // Days without deletions are normal, so there is no zero check here.
        let deleted = paired_counts(&sierra_deleted, &warehouse_deleted);
        for (day, source_count, warehouse_count) in deleted {
            self.log.mismatch_on(
                "Sierra deleted patron",
                &table,
                day,
                source_count,
                warehouse_count,
            );
        }
        Ok(())
    }
}
