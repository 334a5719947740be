//! Holds freshness and integrity in the warehouse.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, scalar_count, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "holds";

const INFO_TABLE: &str = "hold_info";
const QUEUE_TABLE: &str = "queued_holds";

struct HoldsResults {
    /// `(table, rows updated)` for each freshness-checked table.
    updated_counts: Vec<(String, i64)>,
    deleted: Vec<Row>,
    modified: Vec<Row>,
    null: Vec<Row>,
}

pub struct HoldsAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl HoldsAlarms {
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

    async fn fetch(&self) -> Result<HoldsResults, AlarmError> {
        // update_timestamp is UTC and the poller runs late at night, so the
        // newest day of data is the day after the run date.
        let date = self.context.offset(1);
        let info_table = self.context.table(INFO_TABLE);

        let mut updated_counts = Vec::new();
        if self.context.extended_checks_enabled() {
            for table in [info_table.clone(), self.context.table(QUEUE_TABLE)] {
                let rows = self
                    .redshift
                    .execute_query(&redshift::holds_count(&table, date))
                    .await?;
                updated_counts.push((table, scalar_count(&rows)?));
            }
        }

        let deleted = self
            .redshift
            .execute_query(&redshift::holds_deleted(&info_table, date))
            .await?;
        let modified = self
            .redshift
            .execute_query(&redshift::holds_modified(&info_table))
            .await?;
        let null = self
            .redshift
            .execute_query(&redshift::holds_null(&info_table, date))
            .await?;

        Ok(HoldsResults {
            updated_counts,
            deleted,
            modified,
            null,
        })
    }
}

#[async_trait]
impl Alarm for HoldsAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Holds: {}", self.context.offset(1));

        self.redshift.connect().await?;
        let fetched = self.fetch().await;
        let results = close_after(self.redshift.as_ref(), fetched).await?;

        for (table, count) in &results.updated_counts {
            if *count == 0 {
                self.log.raise(format!(
                    "\"{}\" table not updated for all of {} (ET)",
                    table,
                    self.context.run_date()
                ));
            }
        }
        self.log.rows_present(
            "The following hold_ids appear despite having previously been marked as deleted",
            &results.deleted,
        );
        self.log.rows_present(
            "The following hold_ids have an immutable field changing",
            &results.modified,
        );
        self.log.rows_present(
            "The following hold_ids have an improper null value",
            &results.null,
        );
        Ok(())
    }
}
