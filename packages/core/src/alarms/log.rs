//! Emitter binding predicates to a sink on behalf of one check.

use std::fmt::Display;
use std::sync::Arc;

use super::predicates::{self, HealthyRatio};
use super::sink::AlarmSink;
use crate::backend::Row;

/// Evaluates predicates and forwards fired messages to the sink, tagged
/// with the owning check's name. Each method returns whether it fired.
#[derive(Clone)]
pub struct AlarmLog {
    check: &'static str,
    sink: Arc<dyn AlarmSink>,
}

impl AlarmLog {
    pub fn new(check: &'static str, sink: Arc<dyn AlarmSink>) -> Self {
        Self { check, sink }
    }

    /// Emit an unconditional alarm.
    pub fn raise(&self, message: impl AsRef<str>) {
        self.sink.emit(self.check, message.as_ref());
    }

    fn fire(&self, message: Option<String>) -> bool {
        match message {
            Some(message) => {
                self.raise(message);
                true
            }
            None => false,
        }
    }

    pub fn mismatch(
        &self,
        source: &str,
        target: &str,
        source_count: i64,
        warehouse_count: i64,
    ) -> bool {
        self.fire(predicates::mismatch(source, target, source_count, warehouse_count))
    }

    pub fn mismatch_on(
        &self,
        source: &str,
        target: &str,
        date: impl Display,
        source_count: i64,
        warehouse_count: i64,
    ) -> bool {
        self.fire(predicates::mismatch_on(source, target, date, source_count, warehouse_count))
    }

    pub fn no_records_found(
        &self,
        source: &str,
        count: i64,
        date: impl Display,
        condition: bool,
    ) -> bool {
        self.fire(predicates::no_records_found(source, count, date, condition))
    }

    pub fn duplicate_code(&self, code: &str, total: i64, distinct: i64) -> bool {
        self.fire(predicates::duplicate_code(code, total, distinct))
    }

    pub fn null_field(&self, code: &str, rows: &[Row]) -> bool {
        self.fire(predicates::null_field(code, rows))
    }

    pub fn rows_present(&self, prefix: &str, rows: &[Row]) -> bool {
        self.fire(predicates::rows_present(prefix, rows))
    }

    pub fn keys_present<K: AsRef<str>>(&self, prefix: &str, keys: &[K]) -> bool {
        self.fire(predicates::keys_present(prefix, keys))
    }

    pub fn threshold_floor(&self, count: i64, floor: i64, label: &str, date: impl Display) -> bool {
        self.fire(predicates::threshold_floor(count, floor, label, date))
    }

    /// Healthy-ratio alarm. An empty input is logged as a warning and does
    /// not fire.
    pub fn healthy_ratio(&self, flags: &[bool], minimum: f64, label: &str) -> bool {
        match predicates::healthy_ratio(flags, minimum, label) {
            HealthyRatio::Insufficient => {
                tracing::warn!(alarm = self.check, "No {} rows to evaluate health against", label);
                false
            }
            HealthyRatio::Healthy(_) => false,
            HealthyRatio::Unhealthy { message, .. } => {
                self.raise(message);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::sink::MemorySink;

    fn log() -> (AlarmLog, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (AlarmLog::new("pc_reserve", sink.clone()), sink)
    }

    #[test]
    fn fired_predicates_reach_the_sink_with_check_name() {
        let (log, sink) = log();
        assert!(log.mismatch("Envisionware", "PcReserve", 3, 4));
        assert!(!log.mismatch("Envisionware", "PcReserve", 4, 4));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].check, "pc_reserve");
    }

    #[test]
    fn empty_health_input_does_not_fire() {
        let (log, sink) = log();
        assert!(!log.healthy_ratio(&[], 0.5, "ShopperTrak sites"));
        assert!(sink.is_empty());
    }

    #[test]
    fn raise_is_unconditional() {
        let (log, sink) = log();
        log.raise("Failed to scrape OverDrive Marketplace: timeout");
        assert_eq!(sink.messages(), vec!["Failed to scrape OverDrive Marketplace: timeout"]);
    }
}
