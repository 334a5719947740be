//! Daily ShopperTrak visits against the known site list.
//!
//! ShopperTrak keeps revising counts for about a month, so the day checked
//! is 29 days before the run date, once the data has settled.

use std::sync::Arc;

use async_trait::async_trait;

use super::{predicates, Alarm, AlarmError, AlarmLog, AlarmSink};
use crate::backend::{close_after, Backend, Row};
use crate::context::RunContext;
use crate::queries::redshift;
use crate::services::SiteListSource;

pub const NAME: &str = "daily_location_visits";

const SETTLE_DAYS: i64 = 29;
const MINIMUM_HEALTHY_RATIO: f64 = 0.5;

pub struct DailyLocationVisitsAlarms {
    context: Arc<RunContext>,
    log: AlarmLog,
    redshift: Arc<dyn Backend>,
    sites: Arc<dyn SiteListSource>,
}

impl DailyLocationVisitsAlarms {
    pub fn new(
        context: Arc<RunContext>,
        sink: Arc<dyn AlarmSink>,
        redshift: Arc<dyn Backend>,
        sites: Arc<dyn SiteListSource>,
    ) -> Self {
        Self {
            context,
            log: AlarmLog::new(NAME, sink),
            redshift,
            sites,
        }
    }
}

/// Split `(site, is_all_healthy)` rows into site ids and health flags.
fn sites_and_health(rows: &[Row]) -> Result<(Vec<String>, Vec<bool>), AlarmError> {
    let mut sites = Vec::with_capacity(rows.len());
    let mut healthy = Vec::with_capacity(rows.len());
    for row in rows {
        match row.as_slice() {
            [site, flag] => {
                let flag = flag.as_bool().ok_or_else(|| {
                    AlarmError::malformed_row(NAME, format!("non-boolean is_all_healthy {}", flag))
                })?;
                sites.push(site.as_key());
                healthy.push(flag);
            }
            other => {
                return Err(AlarmError::malformed_row(
                    NAME,
                    format!("expected (site, is_all_healthy), got {} columns", other.len()),
                ))
            }
        }
    }
    Ok((sites, healthy))
}

#[async_trait]
impl Alarm for DailyLocationVisitsAlarms {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run_checks(&self) -> Result<(), AlarmError> {
        let date = self.context.offset(-SETTLE_DAYS);
        tracing::info!("Daily Location Visits: {}", date);

        let known_sites = self.sites.fetch_cache().await?;

        let table = self.context.table("daily_location_visits");
        self.redshift.connect().await?;
        let fetched = self
            .redshift
            .execute_query(&redshift::daily_location_visits(&table, date))
            .await;
        let rows = close_after(self.redshift.as_ref(), fetched).await?;
        let (sites, healthy) = sites_and_health(&rows)?;

        self.log.keys_present(
            "The following ShopperTrak sites are duplicated",
            &predicates::duplicate_keys(&sites),
        );
        self.log.keys_present(
            "The following ShopperTrak sites are missing",
            &predicates::missing_keys(&sites, &known_sites),
        );
        self.log.keys_present(
            "The following unknown ShopperTrak site ids were found",
            &predicates::extra_keys(&sites, &known_sites),
        );
        self.log.healthy_ratio(&healthy, MINIMUM_HEALTHY_RATIO, "ShopperTrak sites");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::test_support::*;
    use crate::backend::{ScriptedBackend, Value};
    use crate::services::site_cache::StaticSiteCache;
    use chrono::NaiveDate;

    fn rows(entries: &[(&str, bool)]) -> Vec<Row> {
        entries
            .iter()
            .map(|(site, healthy)| vec![Value::from(*site), Value::Bool(*healthy)])
            .collect()
    }

    fn build(
        backend: &Arc<ScriptedBackend>,
        known: &[&str],
    ) -> (DailyLocationVisitsAlarms, Arc<crate::alarms::MemorySink>) {
        let sink = sink();
        let alarms = DailyLocationVisitsAlarms::new(
            context(true),
            sink.clone(),
            backend.clone(),
            Arc::new(StaticSiteCache::new(known.iter().copied())),
        );
        (alarms, sink)
    }

    #[tokio::test]
    async fn one_in_three_healthy_fires_ratio_alarm() {
        let backend = Arc::new(redshift().with_rows(rows(&[
            ("aa", true),
            ("bb", false),
            ("cc", false),
        ])));
        let (alarms, sink) = build(&backend, &["aa", "bb", "cc"]);

        alarms.run_checks().await.unwrap();

        assert_eq!(sink.messages(), vec!["Only 33.33% of ShopperTrak sites were healthy"]);
        let checked_day = NaiveDate::from_ymd_opt(2023, 5, 2).unwrap();
        assert_eq!(
            backend.queries(),
            vec![redshift::daily_location_visits(
                "daily_location_visits_test_redshift_db",
                checked_day
            )]
        );
    }

    #[tokio::test]
    async fn site_set_differences_are_sorted() {
        let backend = Arc::new(redshift().with_rows(rows(&[
            ("zz", true),
            ("bb", true),
            ("aa", true),
            ("bb", true),
            ("yy", true),
        ])));
        let (alarms, sink) = build(&backend, &["aa", "bb", "dd", "cc"]);

        alarms.run_checks().await.unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                "The following ShopperTrak sites are duplicated: ['bb']",
                "The following ShopperTrak sites are missing: ['cc', 'dd']",
                "The following unknown ShopperTrak site ids were found: ['yy', 'zz']",
            ]
        );
    }

    #[tokio::test]
    async fn no_rows_reports_every_site_missing_and_skips_ratio() {
        let backend = Arc::new(redshift().with_rows(vec![]));
        let (alarms, sink) = build(&backend, &["aa"]);

        alarms.run_checks().await.unwrap();

        assert_eq!(sink.messages(), vec!["The following ShopperTrak sites are missing: ['aa']"]);
    }
}
