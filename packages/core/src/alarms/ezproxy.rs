//! EZproxy sessions.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, scalar_count, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "ezproxy";

/// Minimum sessions expected for one day.
const MINIMUM_DAILY_ROWS: i64 = 1_000;

pub struct EzproxyAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl EzproxyAlarms {
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
        let count = self
            .redshift
            .execute_query(&redshift::ezproxy_count(table, date))
            .await?;
        let duplicates = self
            .redshift
            .execute_query(&redshift::ezproxy_duplicate(table, date))
            .await?;
        Ok((scalar_count(&count)?, duplicates))
    }
}

#[async_trait]
impl Alarm for EzproxyAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("EZproxy: {}", self.context.run_date());
        let table = self.context.table("ezproxy_sessions");

        self.redshift.connect().await?;
        let fetched = self.fetch(&table).await;
        let (count, duplicates) = close_after(self.redshift.as_ref(), fetched).await?;

        let date = self.context.run_date();
        self.log.threshold_floor(count, MINIMUM_DAILY_ROWS, &table, date);
        self.log.rows_present(
            &format!(
                "The following (session_id, patron_id, domain) combinations correspond to more \
                 than one row on {}",
                date
            ),
            &duplicates,
        );
        Ok(())
    }
}
