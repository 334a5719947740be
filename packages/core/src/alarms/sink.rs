//! Where fired alarms go.
//!
//! Only error-level lines carry alarm semantics. Production runs use
//! [`TracingSink`]; tests use [`MemorySink`] to assert on exact wording.

use std::sync::{Mutex, MutexGuard};

pub trait AlarmSink: Send + Sync {
    /// Record one fired alarm raised by `check`.
    fn emit(&self, check: &str, message: &str);
}

/// Emits every alarm as a `tracing` error event tagged with the check name.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AlarmSink for TracingSink {
    fn emit(&self, check: &str, message: &str) {
        tracing::error!(alarm = check, "{}", message);
    }
}

/// A fired alarm captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRecord {
    pub check: String,
    pub message: String,
}

/// Collects alarms in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AlarmRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AlarmRecord> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of alarms whose message contains `fragment`.
    pub fn count_containing(&self, fragment: &str) -> usize {
        self.lock().iter().filter(|r| r.message.contains(fragment)).count()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.count_containing(fragment) > 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AlarmRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AlarmSink for MemorySink {
    fn emit(&self, check: &str, message: &str) {
        self.lock().push(AlarmRecord {
            check: check.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order_and_check_names() {
        let sink = MemorySink::new();
        sink.emit("holds", "first");
        sink.emit("ezproxy", "second");

        assert_eq!(sink.messages(), vec!["first", "second"]);
        assert_eq!(sink.records()[1].check, "ezproxy");
        assert_eq!(sink.len(), 2);
        assert!(sink.contains("sec"));
        assert_eq!(sink.count_containing("i"), 1);
    }
}
