//! Sierra code tables (itypes, locations, stat groups).
//!
//! Each check compares the Sierra row count with the warehouse's active
//! code count, makes sure active codes are unique, and under extended checks
//! looks for codes whose inferred columns never got filled in.

pub mod itype;
pub mod location;
pub mod stat_group;

use super::{AlarmError, AlarmLog};
use crate::backend::{close_after, count_at, Backend, Row};

pub use itype::ItypeCodesAlarms;
pub use location::LocationCodesAlarms;
pub use stat_group::StatGroupCodesAlarms;

/// Active code counts from the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CodeCounts {
    pub total: i64,
    pub distinct: i64,
}

impl CodeCounts {
    /// Remove `n` manually maintained codes from both aggregates.
    pub fn without(self, n: i64) -> Self {
        Self {
            total: self.total - n,
            distinct: self.distinct - n,
        }
    }
}

/// Labels used in a code table's messages.
pub(crate) struct CodeLabels {
    /// Mismatch source, e.g. "Sierra itype".
    pub source: &'static str,
    /// Mismatch target, e.g. "itype".
    pub target: &'static str,
    /// Duplicate code kind, e.g. "itype".
    pub code: &'static str,
}

/// On one warehouse connection, read the `(COUNT, COUNT DISTINCT)` pair
/// and then every follow-up query in order.
pub(crate) async fn fetch_warehouse(
    redshift: &dyn Backend,
    counts_query: &str,
    follow_up: &[String],
) -> Result<(CodeCounts, Vec<Vec<Row>>), AlarmError> {
    redshift.connect().await?;
    let fetched = async {
        let counts = redshift.execute_query(counts_query).await?;
        let mut results = Vec::with_capacity(follow_up.len());
        for query in follow_up {
            results.push(redshift.execute_query(query).await?);
        }
        Ok::<_, AlarmError>((counts, results))
    }
    .await;
    let (counts, results) = close_after(redshift, fetched).await?;
    let counts = CodeCounts {
        total: count_at(&counts, 0)?,
        distinct: count_at(&counts, 1)?,
    };
    Ok((counts, results))
}

/// Mismatch against Sierra, then uniqueness of active codes.
pub(crate) fn report_counts(
    log: &AlarmLog,
    labels: &CodeLabels,
    sierra_count: i64,
    counts: CodeCounts,
) {
    log.mismatch(labels.source, labels.target, sierra_count, counts.total);
    log.duplicate_code(labels.code, counts.total, counts.distinct);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::test_support::*;
    use crate::backend::Value;

    #[tokio::test]
    async fn fetch_warehouse_reads_counts_and_follow_ups_on_one_connection() {
        let backend = redshift()
            .with_rows(vec![vec![Value::Int(11), Value::Int(10)]])
            .with_rows(vec![vec![Value::from("aa")]]);

        let (counts, results) = fetch_warehouse(&backend, "counts", &["nulls".to_string()])
            .await
            .unwrap();

        assert_eq!(counts, CodeCounts { total: 11, distinct: 10 });
        assert_eq!(results, vec![vec![vec![Value::from("aa")]]]);
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.close_count(), 1);
    }

    #[tokio::test]
    async fn fetch_warehouse_rejects_single_column_counts() {
        let backend = redshift().with_rows(vec![vec![Value::Int(11)]]);
        assert!(fetch_warehouse(&backend, "counts", &[]).await.is_err());
        assert_eq!(backend.close_count(), 1);
    }

    #[test]
    fn without_adjusts_both_counts() {
        let counts = CodeCounts { total: 11, distinct: 11 }.without(1);
        assert_eq!(counts, CodeCounts { total: 10, distinct: 10 });
    }
}
