//! Envisionware PC reservations vs the warehouse.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Weekday};

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{record_count, Backend};
use crate::context::RunContext;
use crate::queries::{envisionware, redshift};

pub const NAME: &str = "pc_reserve";

pub struct PcReserveAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    envisionware: Arc<dyn Backend>,
    redshift: Arc<dyn Backend>,
}

impl PcReserveAlarms {
    pub fn new(
        context: Arc<RunContext>,
        sink: Arc<dyn AlarmSink>,
        envisionware: Arc<dyn Backend>,
        redshift: Arc<dyn Backend>,
    ) -> Self {
        Self {
            context,
            log: AlarmLog::new(NAME, sink),
            envisionware,
            redshift,
        }
    }
}

#[async_trait]
impl Alarm for PcReserveAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        // Outside production and test the reservation feed lags one more day.
        let date = if self.context.extended_checks_enabled() {
            self.context.run_date()
        } else {
            self.context.offset(-1)
        };
        tracing::info!("PC Reserve: {}", date);

        let source_count =
            record_count(self.envisionware.as_ref(), &envisionware::pc_reserve_count(date)).await?;
        let table = self.context.table("pc_reserve");
        let warehouse_count =
            record_count(self.redshift.as_ref(), &redshift::pc_reserve_count(&table, date)).await?;

        self.log.mismatch("Envisionware", "PcReserve", source_count, warehouse_count);
        // Every branch is closed on Sunday.
        self.log.no_records_found("PcReserve", source_count, date, date.weekday() != Weekday::Sun);
        Ok(())
    }
}
