//! Granular (15-minute) ShopperTrak location visits.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, scalar_count, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "location_visits";

/// Minimum fresh rows expected for one day.
const MINIMUM_DAILY_ROWS: i64 = 10_000;

/// How far back stale rows are looked for.
const STALE_WINDOW_DAYS: i64 = 30;

pub struct LocationVisitsAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl LocationVisitsAlarms {
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

    async fn fetch(&self, table: &str) -> Result<(i64, Vec<Row>, Vec<Row>), AlarmError> {
        let date = self.context.run_date();
        let count = self
            .redshift
            .execute_query(&redshift::location_visits_count(table, date))
            .await?;
        let duplicates = self
            .redshift
            .execute_query(&redshift::location_visits_duplicate(table, date))
            .await?;
        let stale = self
            .redshift
            .execute_query(&redshift::location_visits_stale(
                table,
                self.context.offset(-STALE_WINDOW_DAYS),
            ))
            .await?;
        Ok((scalar_count(&count)?, duplicates, stale))
    }
}

#[async_trait]
impl Alarm for LocationVisitsAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        if !self.context.extended_checks_enabled() {
            return Ok(());
        }

        tracing::info!("Location Visits: {}", self.context.run_date());
        let table = self.context.table("location_visits");

        self.redshift.connect().await?;
        let fetched = self.fetch(&table).await;
        let (count, duplicates, stale) = close_after(self.redshift.as_ref(), fetched).await?;

        self.log.threshold_floor(count, MINIMUM_DAILY_ROWS, &table, self.context.run_date());
        self.log.rows_present(
            "The following (shoppertrak_site_id, orbit, increment_start) combinations contain \
             more than one fresh row",
            &duplicates,
        );
        self.log.rows_present(
            "The following (shoppertrak_site_id, orbit, increment_start) combinations are marked \
             as stale and have not been replaced with a fresh row",
            &stale,
        );
        Ok(())
    }
}
