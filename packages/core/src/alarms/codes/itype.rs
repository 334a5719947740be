use std::sync::Arc;

use async_trait::async_trait;

use super::{fetch_warehouse, report_counts, CodeLabels};
use crate::alarms::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{record_count, Backend};
use crate::context::RunContext;
use crate::queries::{redshift, sierra};

pub const NAME: &str = "itype_codes";

const LABELS: CodeLabels = CodeLabels {
    source: "Sierra itype",
    target: "itype",
    code: "itype",
};

pub struct ItypeCodesAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    sierra: Arc<dyn Backend>,
    redshift: Arc<dyn Backend>,
}

impl ItypeCodesAlarms {
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
impl Alarm for ItypeCodesAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Itype Codes");
        let sierra_count = record_count(self.sierra.as_ref(), &sierra::itypes_count()).await?;

        let table = self.context.table("sierra_itype_codes");
        let mut follow_up = Vec::new();
        if self.context.extended_checks_enabled() {
            follow_up.push(redshift::itype_null(&table, self.context.run_date()));
        }
        let (counts, results) = fetch_warehouse(
            self.redshift.as_ref(),
            &redshift::code_counts("code", &table),
            &follow_up,
        )
        .await?;

        if let Some(null_codes) = results.first() {
            self.log.null_field("itype_codes", null_codes);
        }
        report_counts(&self.log, &LABELS, sierra_count, counts);
        Ok(())
    }
}
