//! Run-scoped context shared by every check.
//!
//! Built once at startup from the configured warehouse database name and
//! environment, then handed to each check as an `Arc<RunContext>`. Nothing
//! in here changes after construction.

use chrono::{Duration, NaiveDate, Utc};

/// Warehouse database name whose tables carry no suffix.
pub const PRODUCTION_DATABASE: &str = "production";

/// Environments in which the stricter ("extended") checks run.
pub const EXTENDED_CHECK_ENVIRONMENTS: &[&str] = &["production", "test"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    run_date: NaiveDate,
    table_suffix: String,
    extended_checks_enabled: bool,
}

impl RunContext {
    pub fn new(
        run_date: NaiveDate,
        table_suffix: impl Into<String>,
        extended_checks_enabled: bool,
    ) -> Self {
        Self {
            run_date,
            table_suffix: table_suffix.into(),
            extended_checks_enabled,
        }
    }

    /// Derive the suffix and the extended-checks flag from configuration.
    pub fn from_environment(
        run_date: NaiveDate,
        warehouse_database: &str,
        environment: &str,
    ) -> Self {
        Self::new(
            run_date,
            table_suffix_for(warehouse_database),
            extended_checks_for(environment),
        )
    }

    /// Yesterday's date in UTC, the default reconciliation target.
    pub fn yesterday_utc() -> NaiveDate {
        (Utc::now() - Duration::days(1)).date_naive()
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn table_suffix(&self) -> &str {
        &self.table_suffix
    }

    pub fn extended_checks_enabled(&self) -> bool {
        self.extended_checks_enabled
    }

    /// Environment-specific name of a warehouse table.
    pub fn table(&self, base: &str) -> String {
        format!("{}{}", base, self.table_suffix)
    }

    /// `run_date` shifted by `days` (negative values go back in time).
    pub fn offset(&self, days: i64) -> NaiveDate {
        self.run_date + Duration::days(days)
    }
}

pub fn table_suffix_for(warehouse_database: &str) -> String {
    if warehouse_database == PRODUCTION_DATABASE {
        String::new()
    } else {
        format!("_{}", warehouse_database)
    }
}

pub fn extended_checks_for(environment: &str) -> bool {
    EXTENDED_CHECK_ENVIRONMENTS.contains(&environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn may_31() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, 31).unwrap()
    }

    #[test]
    fn production_database_has_no_suffix() {
        let context = RunContext::from_environment(may_31(), "production", "production");
        assert_eq!(context.table_suffix(), "");
        assert_eq!(context.table("hold_info"), "hold_info");
    }

    #[test]
    fn other_databases_append_their_name() {
        let context = RunContext::from_environment(may_31(), "test_redshift_db", "test");
        assert_eq!(context.table_suffix(), "_test_redshift_db");
        assert_eq!(context.table("hold_info"), "hold_info_test_redshift_db");
    }

    #[test]
    fn extended_checks_only_in_production_and_test() {
        assert!(extended_checks_for("production"));
        assert!(extended_checks_for("test"));
        assert!(!extended_checks_for("qa"));
        assert!(!extended_checks_for("devel"));
    }

    #[test]
    fn run_date_and_offsets_use_iso_dates() {
        let context = RunContext::new(may_31(), "", true);
        assert_eq!(context.run_date().to_string(), "2023-05-31");
        assert_eq!(context.offset(1).to_string(), "2023-06-01");
        assert_eq!(context.offset(-30).to_string(), "2023-05-01");
    }
}
