use chrono::NaiveDate;
use clap::Parser;

/// Warehouse alarms CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "warehouse-alarms",
    version,
    about = "Nightly reconciliation alarms for the library data warehouse"
)]
pub struct Cli {
    /// Date to reconcile (YYYY-MM-DD); defaults to yesterday in UTC
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Run only the named check; repeat to run several
    #[arg(long = "check", value_name = "NAME")]
    pub checks: Vec<String>,

    /// Stop at the first check that fails instead of running the rest
    #[arg(long)]
    pub fail_fast: bool,

    /// Print the available check names and exit
    #[arg(long)]
    pub list_checks: bool,
}
