//! Sierra to Drupal branch code mapping.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;

pub const NAME: &str = "branch_codes_map";

pub struct BranchCodesMapAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
}

impl BranchCodesMapAlarms {
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

    async fn fetch(&self, branch_codes_table: &str) -> Result<(Vec<Row>, Vec<Row>), AlarmError> {
        let duplicates = self
            .redshift
            .execute_query(&redshift::branch_codes_duplicate(branch_codes_table))
            .await?;
        let unmatched = if self.context.extended_checks_enabled() {
            let hours_table = self.context.table("location_hours");
            self.redshift
                .execute_query(&redshift::branch_codes_hours(&hours_table, branch_codes_table))
                .await?
        } else {
            Vec::new()
        };
        Ok((duplicates, unmatched))
    }
}

/// Split `(hours code, mapped code)` rows from the outer join into hours
/// codes with no mapping and mapped codes with no hours.
fn split_unmatched(rows: &[Row]) -> Result<(Vec<String>, Vec<String>), AlarmError> {
    let mut without_mapping = Vec::new();
    let mut without_hours = Vec::new();
    for row in rows {
        match row.as_slice() {
            [hours, mapped] if mapped.is_null() && !hours.is_null() => {
                without_mapping.push(hours.as_key())
            }
            [hours, mapped] if hours.is_null() && !mapped.is_null() => {
                without_hours.push(mapped.as_key())
            }
            [_, _] => {}
            other => {
                return Err(AlarmError::malformed_row(
                    NAME,
                    format!("expected (hours code, mapped code), got {} columns", other.len()),
                ))
            }
        }
    }
    Ok((without_mapping, without_hours))
}

#[async_trait]
impl Alarm for BranchCodesMapAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Branch Codes Map");
        let branch_codes_table = self.context.table("branch_codes_map");

        self.redshift.connect().await?;
        let fetched = self.fetch(&branch_codes_table).await;
        let (duplicates, unmatched) = close_after(self.redshift.as_ref(), fetched).await?;
        let (without_mapping, without_hours) = split_unmatched(&unmatched)?;

        self.log.rows_present(
            "The following Sierra branch codes map to more than one Drupal branch code",
            &duplicates,
        );
        self.log.keys_present(
            "The following Drupal branch codes have location hours but do not have a known \
             Sierra branch mapping",
            &without_mapping,
        );
        self.log.keys_present(
            "The following Sierra branch codes do not have known hours",
            &without_hours,
        );
        Ok(())
    }
}
