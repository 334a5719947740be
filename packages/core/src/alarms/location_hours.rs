//! Drupal location hours.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "location_hours";

pub struct LocationHoursAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl LocationHoursAlarms {
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

    async fn fetch(&self, table: &str) -> Result<(Vec<Row>, Vec<Row>), AlarmError> {
        let branch_codes_table = self.context.table("branch_codes_map");
        let not_current = self
            .redshift
            .execute_query(&redshift::hours_current(table))
            .await?;
        let unknown = self
            .redshift
            .execute_query(&redshift::hours_location_id(
                table,
                &branch_codes_table,
                self.context.run_date(),
            ))
            .await?;
        Ok((not_current, unknown))
    }
}

#[async_trait]
impl Alarm for LocationHoursAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Location Hours");
        let table = self.context.table("location_hours_v2");

        self.redshift.connect().await?;
        let fetched = self.fetch(&table).await;
        let (not_current, unknown) = close_after(self.redshift.as_ref(), fetched).await?;

        self.log.rows_present(
            "The following (location_id, weekday) combinations did not contain exactly one \
             current row",
            &not_current,
        );
        self.log.rows_present("The following location_ids are unknown", &unknown);
        Ok(())
    }
}
