use std::sync::Arc;

use async_trait::async_trait;

use super::{fetch_warehouse, report_counts, CodeLabels};
use crate::alarms::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{record_count, Backend};
use crate::context::RunContext;
use crate::queries::{redshift, sierra};

pub const NAME: &str = "stat_group_codes";

const SIERRA_TABLE: &str = "sierra_view.statistic_group_myuser";

/// Stat group code 0 is maintained by hand in the warehouse and has no
/// Sierra counterpart.
const MANUAL_CODES: i64 = 1;

const LABELS: CodeLabels = CodeLabels {
    source: "Sierra stat group",
    target: "stat group",
    code: "stat group",
};

pub struct StatGroupCodesAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    sierra: Arc<dyn Backend>,
    redshift: Arc<dyn Backend>,
}

impl StatGroupCodesAlarms {
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
impl Alarm for StatGroupCodesAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Stat Group Codes");
        let sierra_count =
            record_count(self.sierra.as_ref(), &sierra::code_count(SIERRA_TABLE)).await?;

        let stat_group_table = self.context.table("sierra_stat_group_codes");
        let location_table = self.context.table("sierra_location_codes");
        let date = self.context.run_date();

        let mut follow_up = Vec::new();
        if self.context.extended_checks_enabled() {
            follow_up.push(redshift::stat_group_null(&stat_group_table, date));
            follow_up.push(redshift::stat_group_location(&stat_group_table, &location_table, date));
        }
        let (counts, results) = fetch_warehouse(
            self.redshift.as_ref(),
            &redshift::code_counts("stat_group_code", &stat_group_table),
            &follow_up,
        )
        .await?;

        if let [null_branch_codes, unknown_branch_codes] = results.as_slice() {
            self.log.rows_present(
                "The following stat_group_codes have a null normalized_branch_code",
                null_branch_codes,
            );
            self.log.rows_present(
                &format!(
                    "The following stat_group_codes have a normalized_branch_code that does not \
                     appear in {}",
                    location_table
                ),
                unknown_branch_codes,
            );
        }
        report_counts(&self.log, &LABELS, sierra_count, counts.without(MANUAL_CODES));
        Ok(())
    }
}
