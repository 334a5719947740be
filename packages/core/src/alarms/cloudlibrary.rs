//! cloudLibrary transactions.
//!
//! cloudLibrary data takes about five days to land, so once a week (on a
//! Wednesday run) the seven days ending four days before the run date are
//! each checked for at least one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, scalar_count, Backend};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "cloudlibrary";

const LAG_DAYS: i64 = 4;
const WINDOW_DAYS: i64 = 7;

pub struct CloudLibraryAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl CloudLibraryAlarms {
    pub fn new(
        context: Arc<RunContext>,
        sink: Arc<dyn AlarmSink>,
        redshift: Arc<dyn Backend>,
    ) -> Self {
        Self {
            context,
            log: AlarmLog::new(NAME, sink),
            redshift,
        }
    }

    /// Checked days, oldest first.
    fn days(&self) -> Vec<NaiveDate> {
        let newest = -LAG_DAYS;
        (newest - WINDOW_DAYS + 1..=newest)
            .map(|offset| self.context.offset(offset))
            .collect()
    }

    async fn fetch(&self, table: &str, days: &[NaiveDate]) -> Result<Vec<i64>, AlarmError> {
        let mut counts = Vec::with_capacity(days.len());
        for day in days {
            let rows = self
                .redshift
                .execute_query(&redshift::ebook_count(table, *day))
                .await?;
            counts.push(scalar_count(&rows)?);
        }
        Ok(counts)
    }
}

#[async_trait]
impl Alarm for CloudLibraryAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        if self.context.run_date().weekday() != Weekday::Wed {
            return Ok(());
        }

        let days = self.days();
        let table = self.context.table("cloudlibrary_transactions");
        tracing::info!(
            "cloudLibrary: {} day(s) ending {}",
            days.len(),
            self.context.offset(-LAG_DAYS)
        );

        self.redshift.connect().await?;
        let fetched = self.fetch(&table, &days).await;
        let counts = close_after(self.redshift.as_ref(), fetched).await?;

        for (day, count) in days.iter().zip(counts) {
            self.log.no_records_found("cloudLibrary", count, day, true);
        }
        Ok(())
    }
}
