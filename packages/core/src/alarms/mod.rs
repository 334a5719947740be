//! Alarm evaluation engine
//!
//! Pure predicates ([`predicates`]), the emitter that writes fired alarms
//! to a sink ([`AlarmLog`]), and one [`Alarm`] implementation per
//! reconciliation domain.

pub mod branch_codes_map;
pub mod circ_trans;
pub mod cloudlibrary;
pub mod codes;
pub mod daily_location_visits;
pub mod error;
pub mod ezproxy;
pub mod holds;
pub mod location_closures;
pub mod location_hours;
pub mod location_visits;
pub mod log;
pub mod overdrive;
pub mod patron_info;
pub mod pc_reserve;
pub mod predicates;
pub mod sink;

#[cfg(test)]
mod test_support;

use async_trait::async_trait;

pub use branch_codes_map::BranchCodesMapAlarms;
pub use circ_trans::CircTransAlarms;
pub use cloudlibrary::CloudLibraryAlarms;
pub use codes::{ItypeCodesAlarms, LocationCodesAlarms, StatGroupCodesAlarms};
pub use daily_location_visits::DailyLocationVisitsAlarms;
pub use error::AlarmError;
pub use ezproxy::EzproxyAlarms;
pub use holds::HoldsAlarms;
pub use location_closures::LocationClosuresAlarms;
pub use location_hours::LocationHoursAlarms;
pub use location_visits::LocationVisitsAlarms;
pub use log::AlarmLog;
pub use overdrive::OverDriveCheckoutsAlarms;
pub use patron_info::PatronInfoAlarms;
pub use pc_reserve::PcReserveAlarms;
pub use sink::{AlarmRecord, AlarmSink, MemorySink, TracingSink};

/// One reconciliation check.
///
/// `run_checks` returns `Ok(())` whether or not any alarm fired; an `Err`
/// means the check itself could not complete.
#[async_trait]
pub trait Alarm: Send + Sync {
    /// Stable identifier used on the CLI and in log fields.
    fn name(&self) -> &'static str;

    async fn run_checks(&self) -> Result<(), AlarmError>;
}

/// Names of every check in run order.
pub const CHECK_NAMES: [&str; 15] = [
    circ_trans::NAME,
    holds::NAME,
    patron_info::NAME,
    pc_reserve::NAME,
    codes::itype::NAME,
    codes::location::NAME,
    codes::stat_group::NAME,
    location_visits::NAME,
    daily_location_visits::NAME,
    branch_codes_map::NAME,
    location_hours::NAME,
    location_closures::NAME,
    overdrive::NAME,
    cloudlibrary::NAME,
    ezproxy::NAME,
];
