//! Sierra ILS (reference system) queries.

use chrono::NaiveDate;

/// Timezone used to bucket circulation transactions into days.
pub const NEW_YORK_TIMEZONE: &str = "America/New_York";

/// Timezone of the legacy circulation feed.
pub const LEGACY_TIMEZONE: &str = "EST";

pub fn circ_trans_count(date: NaiveDate, timezone: &str) -> String {
    format!(
        "SELECT COUNT(id) FROM sierra_view.circ_trans \
         WHERE (transaction_gmt AT TIME ZONE '{timezone}')::DATE = '{date}';"
    )
}

/// `(creation day, count)` of patron records created in `[start, end)`.
pub fn new_patrons(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "
    SELECT (creation_date_gmt AT TIME ZONE 'EST')::DATE, COUNT(id)
    FROM sierra_view.record_metadata
    WHERE record_type_code = 'p'
        AND (creation_date_gmt AT TIME ZONE 'EST')::DATE >= '{start}'
        AND (creation_date_gmt AT TIME ZONE 'EST')::DATE < '{end}'
    GROUP BY (creation_date_gmt AT TIME ZONE 'EST')::DATE;"
    )
}

/// `(deletion day, count)` of patron records deleted in `[start, end)`.
pub fn deleted_patrons(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "
    SELECT deletion_date_gmt, COUNT(id)
    FROM sierra_view.record_metadata
    WHERE record_type_code = 'p'
        AND deletion_date_gmt >= '{start}'
        AND deletion_date_gmt < '{end}'
    GROUP BY deletion_date_gmt;"
    )
}

pub fn code_count(table: &str) -> String {
    format!("SELECT COUNT(code) FROM {table};")
}

/// Itypes with a blank name are placeholders and are never loaded.
pub fn itypes_count() -> String {
    "SELECT COUNT(code) FROM sierra_view.itype_property_myuser WHERE TRIM(name) != '';".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn circ_trans_count_uses_timezone_and_date() {
        let query = circ_trans_count(date("2023-05-31"), NEW_YORK_TIMEZONE);
        assert_eq!(
            query,
            "SELECT COUNT(id) FROM sierra_view.circ_trans \
             WHERE (transaction_gmt AT TIME ZONE 'America/New_York')::DATE = '2023-05-31';"
        );
    }

    #[test]
    fn patron_windows_are_half_open() {
        let query = new_patrons(date("2023-05-24"), date("2023-05-31"));
        assert!(query.contains(">= '2023-05-24'"));
        assert!(query.contains("< '2023-05-31'"));

        let query = deleted_patrons(date("2023-05-24"), date("2023-05-31"));
        assert!(query.contains("deletion_date_gmt >= '2023-05-24'"));
        assert!(query.contains("deletion_date_gmt < '2023-05-31'"));
    }

    #[test]
    fn code_count_names_table() {
        assert_eq!(
            code_count("sierra_view.location_myuser"),
            "SELECT COUNT(code) FROM sierra_view.location_myuser;"
        );
        assert!(itypes_count().contains("TRIM(name) != ''"));
    }
}
