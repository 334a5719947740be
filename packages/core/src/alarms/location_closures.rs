//! Drupal location closures.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, scalar_count, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "location_closures";

pub struct LocationClosuresAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl LocationClosuresAlarms {
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

    async fn fetch(&self, table: &str) -> Result<(i64, Vec<Row>), AlarmError> {
        let date = self.context.run_date();
        let branch_codes_table = self.context.table("branch_codes_map");
        let count = self
            .redshift
            .execute_query(&redshift::closures_count(table, date))
            .await?;
        let unknown = self
            .redshift
            .execute_query(&redshift::closures_location_id(table, &branch_codes_table, date))
            .await?;
        Ok((scalar_count(&count)?, unknown))
    }
}

#[async_trait]
impl Alarm for LocationClosuresAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Location Closures");
        let table = self.context.table("location_closures_v2");

        self.redshift.connect().await?;
        let fetched = self.fetch(&table).await;
        let (count, unknown) = close_after(self.redshift.as_ref(), fetched).await?;

        self.log.no_records_found(&table, count, self.context.run_date(), true);
        self.log.rows_present("The following location_ids are unknown", &unknown);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::test_support::*;
    use crate::backend::mock::{count_rows, single_column};

    #[tokio::test]
    async fn empty_day_and_unknown_ids_fire() {
        let backend = Arc::new(
            redshift()
                .with_rows(count_rows(0))
                .with_rows(single_column(["abc", "def"])),
        );
        let sink = sink();
        let alarms = LocationClosuresAlarms::new(context(false), sink.clone(), backend.clone());

        alarms.run_checks().await.unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                "No location_closures_v2_test_redshift_db records found for all of 2023-05-31",
                "The following location_ids are unknown: ['abc', 'def']",
            ]
        );
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.close_count(), 1);
    }

    #[tokio::test]
    async fn populated_day_logs_nothing() {
        let backend = Arc::new(redshift().with_responses([count_rows(3), vec![]]));
        let sink = sink();
        let alarms = LocationClosuresAlarms::new(context(true), sink.clone(), backend.clone());

        alarms.run_checks().await.unwrap();

        assert!(sink.is_empty());
    }
}
