//! Circulation transactions: Sierra daily count vs the warehouse tables.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{record_count, Backend};
use crate::context::RunContext;
use crate::queries::{redshift, sierra};

pub const NAME: &str = "circ_trans";

const SOURCE: &str = "Sierra circ trans";

/// A timezone convention and the warehouse tables loaded under it.
struct Era {
    timezone: &'static str,
    /// `(table, date expression)` pairs.
    tables: &'static [(&'static str, &'static str)],
}

const CURRENT_ERA: Era = Era {
    timezone: sierra::NEW_YORK_TIMEZONE,
    tables: &[
        ("patron_circ_trans", "transaction_et"),
        (
            "item_circ_trans",
            "CONVERT_TIMEZONE('America/New_York', transaction_timestamp)::DATE",
        ),
    ],
};

const LEGACY_ERA: Era = Era {
    timezone: sierra::LEGACY_TIMEZONE,
    tables: &[("circ_trans", "transaction_et")],
};

pub struct CircTransAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    sierra: Arc<dyn Backend>,
    redshift: Arc<dyn Backend>,
    include_legacy: bool,
}

impl CircTransAlarms {
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
            include_legacy: false,
        }
    }

    /// Also reconcile the legacy EST-bucketed `circ_trans` table.
    pub fn with_legacy_era(mut self, include: bool) -> Self {
        self.include_legacy = include;
        self
    }

    async fn check_era(&self, era: &Era) -> Result<(), AlarmError> {
        let date = self.context.run_date();
        let sierra_query = sierra::circ_trans_count(date, era.timezone);
        let sierra_count = record_count(self.sierra.as_ref(), &sierra_query).await?;

        for (base, date_field) in era.tables {
            let table = self.context.table(base);
            let query = redshift::circ_trans_count(&table, date_field, date);
            let warehouse_count = record_count(self.redshift.as_ref(), &query).await?;
            self.log.mismatch(SOURCE, &table, sierra_count, warehouse_count);
        }

        self.log.no_records_found(
            SOURCE,
            sierra_count,
            date,
            self.context.extended_checks_enabled(),
        );
        Ok(())
    }
}

#[async_trait]
impl Alarm for CircTransAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        tracing::info!("Circ Trans: {}", self.context.run_date());
        self.check_era(&CURRENT_ERA).await?;
        if self.include_legacy {
            self.check_era(&LEGACY_ERA).await?;
        }
        Ok(())
    }
}
