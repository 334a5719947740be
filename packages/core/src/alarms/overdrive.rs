//! OverDrive checkouts: Marketplace report total vs the warehouse.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, scalar_count, Backend};
use crate::context::RunContext;
use crate::queries::redshift;
use crate::services::CheckoutCountSource;

pub const NAME: &str = "overdrive_checkouts";

const SOURCE: &str = "OverDrive Marketplace";

pub struct OverDriveCheckoutsAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
    checkouts: Arc<dyn CheckoutCountSource>,
}

impl OverDriveCheckoutsAlarms {
    pub fn new(
        context: Arc<RunContext>,
        sink: Arc<dyn AlarmSink>,
        redshift: Arc<dyn Backend>,
        checkouts: Arc<dyn CheckoutCountSource>,
    ) -> Self {
        Self {
            context,
            log: AlarmLog::new(NAME, sink),
            redshift,
            checkouts,
        }
    }

    /// Warehouse row count for `date`, collapsed to Marketplace semantics.
    ///
    /// Marketplace counts a title downloaded on several platforms once; the
    /// warehouse stores one row per platform with the same checksum. Each
    /// such checksum contributes `platforms - 1` extra rows.
    async fn adjusted_count(&self, table: &str, date: NaiveDate) -> Result<i64, AlarmError> {
        let rows = self
            .redshift
            .execute_query(&redshift::ebook_count(table, date))
            .await?;
        let count = scalar_count(&rows)?;

        let duplicates = self
            .redshift
            .execute_query(&redshift::overdrive_duplicate(table, date))
            .await?;

        let mut extra_rows = 0;
        for row in &duplicates {
            let checksum = row
                .first()
                .ok_or_else(|| AlarmError::malformed_row(NAME, "empty checksum row"))?;
            // Rows without a checksum cannot be matched across platforms.
            if checksum.is_null() {
                continue;
            }
            let checksum = checksum.as_key();
            let platforms = self
                .redshift
                .execute_query(&redshift::overdrive_duplicate_platform(table, date, &checksum))
                .await?;
            extra_rows += platforms.len().saturating_sub(1) as i64;
        }

        Ok(count - extra_rows)
    }
}

#[async_trait]
impl Alarm for OverDriveCheckoutsAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        let date = self.context.run_date();
        tracing::info!("OverDrive Checkouts: {}", date);

        let vendor_count = match self.checkouts.get_count(date).await {
            Ok(count) => count,
            Err(err) => {
                self.log.raise(format!("Failed to scrape OverDrive Marketplace: {}", err));
                return Ok(());
            }
        };

        let table = self.context.table("overdrive_checkouts");
        self.redshift.connect().await?;
        let fetched = self.adjusted_count(&table, date).await;
        let warehouse_count = close_after(self.redshift.as_ref(), fetched).await?;

        self.log.no_records_found(SOURCE, vendor_count, date, true);
        self.log.mismatch(SOURCE, &table, vendor_count, warehouse_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::test_support::*;
    use crate::backend::mock::{count_rows, single_column};
    use crate::backend::{ScriptedBackend, Value};
    use crate::services::{ScrapeError, StubCheckoutSource};

    fn build(
        backend: &Arc<ScriptedBackend>,
        source: StubCheckoutSource,
    ) -> (OverDriveCheckoutsAlarms, Arc<crate::alarms::MemorySink>) {
        let sink = sink();
        let alarms = OverDriveCheckoutsAlarms::new(
            context(true),
            sink.clone(),
            backend.clone(),
            Arc::new(source),
        );
        (alarms, sink)
    }

    #[tokio::test]
    async fn scrape_failure_logs_once_and_skips_warehouse() {
        let backend = Arc::new(redshift());
        let (alarms, sink) = build(&backend, StubCheckoutSource::failing(ScrapeError::LoginFailed));

        alarms.run_checks().await.unwrap();

        assert_eq!(
            sink.messages(),
            vec!["Failed to scrape OverDrive Marketplace: OverDrive Marketplace login failed"]
        );
        assert!(backend.untouched());
    }

    #[tokio::test]
    async fn cross_platform_duplicates_are_collapsed() {
        // 12 rows, two checksums duplicated: one across 3 platforms, one
        // repeated on a single platform.
        let backend = Arc::new(redshift().with_responses([
            count_rows(12),
            single_column(["abc", "def"]),
            single_column(["app", "web", "kindle"]),
            single_column(["app"]),
        ]));
        let (alarms, sink) = build(&backend, StubCheckoutSource::count(10));

        alarms.run_checks().await.unwrap();

        assert!(sink.is_empty());
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.close_count(), 1);
        assert_eq!(
            backend.queries()[3],
            redshift::overdrive_duplicate_platform(
                "overdrive_checkouts_test_redshift_db",
                may_31(),
                "def"
            )
        );
    }

    #[tokio::test]
    async fn mismatch_after_adjustment_is_reported() {
        let backend = Arc::new(redshift().with_responses([count_rows(9), vec![]]));
        let (alarms, sink) = build(&backend, StubCheckoutSource::count(10));

        alarms.run_checks().await.unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                "Number of OverDrive Marketplace records does not match number of Redshift \
                 overdrive_checkouts_test_redshift_db records: 10 OverDrive Marketplace records \
                 and 9 Redshift records"
            ]
        );
    }

    #[tokio::test]
    async fn zero_marketplace_checkouts_always_alarm() {
        let backend = Arc::new(redshift().with_responses([count_rows(0), vec![]]));
        let source = StubCheckoutSource::count(0);
        let sink = sink();
        let alarms = OverDriveCheckoutsAlarms::new(
            context(false),
            sink.clone(),
            backend.clone(),
            Arc::new(source),
        );

        alarms.run_checks().await.unwrap();

        assert_eq!(
            sink.messages(),
            vec!["No OverDrive Marketplace records found for all of 2023-05-31"]
        );
    }

    #[tokio::test]
    async fn null_checksums_are_not_collapsed() {
        let backend = Arc::new(redshift().with_responses([
            count_rows(5),
            vec![vec![Value::Null], vec![Value::from("abc")]],
            single_column(["app", "web"]),
        ]));
        let (alarms, sink) = build(&backend, StubCheckoutSource::count(4));

        alarms.run_checks().await.unwrap();

        assert!(sink.is_empty());
        let queries = backend.queries();
        assert_eq!(queries.len(), 3);
        assert!(!queries.iter().any(|query| query.contains("'NULL'")));
    }
}
