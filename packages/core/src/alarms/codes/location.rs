use std::sync::Arc;

use async_trait::async_trait;

use super::{fetch_warehouse, report_counts, CodeLabels};
use crate::alarms::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{record_count, Backend};
use crate::context::RunContext;
use crate::queries::{redshift, sierra};

pub const NAME: &str = "location_codes";

const SIERRA_TABLE: &str = "sierra_view.location_myuser";

const LABELS: CodeLabels = CodeLabels {
    source: "Sierra location",
    target: "location",
    code: "location",
};

pub struct LocationCodesAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    sierra: Arc<dyn Backend>,
    redshift: Arc<dyn Backend>,
}

impl LocationCodesAlarms {
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
}

#[async_trait]
impl Alarm for LocationCodesAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Location Codes");
        let sierra_count =
            record_count(self.sierra.as_ref(), &sierra::code_count(SIERRA_TABLE)).await?;

        let table = self.context.table("sierra_location_codes");
        let mut follow_up = Vec::new();
        if self.context.extended_checks_enabled() {
            follow_up.push(redshift::location_null(&table, self.context.run_date()));
        }
        let (counts, results) = fetch_warehouse(
            self.redshift.as_ref(),
            &redshift::code_counts("location_code", &table),
            &follow_up,
        )
        .await?;

        if let Some(null_codes) = results.first() {
            self.log.null_field("location_codes", null_codes);
        }
        report_counts(&self.log, &LABELS, sierra_count, counts);
        Ok(())
    }
}
