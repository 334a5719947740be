//! Redshift (warehouse) queries.

use chrono::NaiveDate;

use super::quote_literal;

// ---- counts ----

/// Count of rows in `table` whose `date_field` expression equals `date`.
pub fn circ_trans_count(table: &str, date_field: &str, date: NaiveDate) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE {date_field} = '{date}';")
}

pub fn pc_reserve_count(table: &str, date: NaiveDate) -> String {
    format!("SELECT COUNT(key) FROM {table} WHERE transaction_et = '{date}';")
}

/// Count of e-book transactions (OverDrive, cloudLibrary) on `date`.
pub fn ebook_count(table: &str, date: NaiveDate) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE transaction_et = '{date}';")
}

/// `(COUNT, COUNT DISTINCT)` of active codes.
pub fn code_counts(code: &str, table: &str) -> String {
    format!(
        "SELECT COUNT({code}), COUNT(DISTINCT {code}) FROM {table} \
         WHERE deletion_date IS NULL;"
    )
}

// ---- patrons ----

pub fn new_patrons(table: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "
    SELECT creation_date_et, COUNT(patron_id)
    FROM {table}
    WHERE creation_date_et >= '{start}'
        AND creation_date_et < '{end}'
    GROUP BY creation_date_et;"
    )
}

pub fn deleted_patrons(table: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "
    SELECT deletion_date_et, COUNT(patron_id)
    FROM {table}
    WHERE deletion_date_et >= '{start}'
        AND deletion_date_et < '{end}'
    GROUP BY deletion_date_et;"
    )
}

// ---- holds ----

pub fn holds_count(table: &str, date: NaiveDate) -> String {
    format!("SELECT COUNT(id) FROM {table} WHERE TRUNC(update_timestamp) = '{date}';")
}

/// Holds updated on `date` that were previously marked deleted (all
/// immutable fields null).
pub fn holds_deleted(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT hold_id FROM {table}
    WHERE TRUNC(update_timestamp) = '{date}'
        AND (record_id IS NOT NULL
            OR record_type IS NOT NULL
            OR placed_utc IS NOT NULL)
        AND hold_id IN (
            SELECT hold_id FROM {table}
            WHERE record_id IS NULL
                AND record_type IS NULL
                AND placed_utc IS NULL);"
    )
}

/// Live holds whose immutable fields took more than one value.
pub fn holds_modified(table: &str) -> String {
    format!(
        "
    SELECT hold_id FROM {table}
    WHERE hold_id NOT IN (
        SELECT hold_id FROM {table}
        WHERE record_id IS NULL
            AND record_type IS NULL
            AND placed_utc IS NULL)
    GROUP BY hold_id
    HAVING COUNT(DISTINCT record_id) > 1
        OR COUNT(DISTINCT record_type) > 1
        OR COUNT(DISTINCT placed_utc) > 1;"
    )
}

pub fn holds_null(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT hold_id FROM {table}
    WHERE TRUNC(update_timestamp) = '{date}'
        AND (
            hold_id IS NULL
            OR (
                (
                    record_id IS NULL
                    OR record_type IS NULL
                    OR placed_utc IS NULL
                )
                AND hold_id NOT IN (
                    SELECT hold_id FROM {table}
                    WHERE record_id IS NULL
                        AND record_type IS NULL
                        AND placed_utc IS NULL
                )
            )
        );"
    )
}

// ---- sierra codes ----

pub fn itype_null(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT code FROM {table}
    WHERE code != 0
        AND creation_date = '{date}'
        AND (is_research IS NULL
            OR age_category IS NULL
            OR is_print IS NULL);"
    )
}

pub fn location_null(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT location_code FROM {table}
    WHERE creation_date = '{date}'
        AND shelving_category IS NULL
        AND (research_branch IS NULL OR is_mixed_use = TRUE);"
    )
}

pub fn stat_group_null(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT stat_group_code FROM {table}
    WHERE creation_date = '{date}'
        AND normalized_branch_code IS NULL;"
    )
}

/// Stat groups whose branch code is not an active location code.
pub fn stat_group_location(
    stat_group_table: &str,
    location_table: &str,
    date: NaiveDate,
) -> String {
    format!(
        "
    SELECT stat_group_code FROM {stat_group_table}
    WHERE creation_date = '{date}'
        AND normalized_branch_code NOT IN
            (SELECT location_code FROM {location_table}
            WHERE deletion_date IS NULL);"
    )
}

// ---- location visits ----

pub fn location_visits_count(table: &str, date: NaiveDate) -> String {
    format!(
        "SELECT COUNT(id) FROM {table} \
         WHERE increment_start::DATE = '{date}' AND is_fresh;"
    )
}

pub fn location_visits_duplicate(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT shoppertrak_site_id, orbit, increment_start
    FROM {table}
    WHERE increment_start::DATE = '{date}' AND is_fresh
    GROUP BY shoppertrak_site_id, orbit, increment_start
    HAVING COUNT(*) > 1;"
    )
}

/// Stale keys polled since `since` that never received a fresh row.
pub fn location_visits_stale(table: &str, since: NaiveDate) -> String {
    format!(
        "
    WITH stale_keys AS (
        SELECT shoppertrak_site_id, orbit, increment_start,
            CONCAT(CONCAT(shoppertrak_site_id, orbit), increment_start) AS key
        FROM {table}
        WHERE poll_date >= '{since}' AND NOT is_fresh
    )
    SELECT shoppertrak_site_id, orbit, increment_start
    FROM stale_keys
    WHERE key NOT IN (
        SELECT CONCAT(CONCAT(shoppertrak_site_id, orbit), increment_start)
        FROM {table}
        WHERE poll_date >= '{since}' AND is_fresh
    );"
    )
}

/// `(shoppertrak_site_id, is_all_healthy)` for every daily row on `date`.
pub fn daily_location_visits(table: &str, date: NaiveDate) -> String {
    format!(
        "SELECT shoppertrak_site_id, is_all_healthy FROM {table} \
         WHERE visits_date = '{date}';"
    )
}

// ---- branch codes, hours, closures ----

pub fn branch_codes_duplicate(table: &str) -> String {
    format!(
        "
    SELECT sierra_code FROM {table}
    GROUP BY sierra_code
    HAVING COUNT(*) > 1;"
    )
}

/// `(hours location id, mapped sierra code)` pairs where one side has no
/// partner in the other table.
pub fn branch_codes_hours(hours_table: &str, branch_codes_table: &str) -> String {
    format!(
        "
    SELECT DISTINCT hours.drupal_location_id, branch_codes.sierra_code
    FROM {hours_table} hours
    FULL OUTER JOIN {branch_codes_table} branch_codes
        ON hours.drupal_location_id = branch_codes.drupal_code
    WHERE hours.drupal_location_id IS NULL
        OR branch_codes.drupal_code IS NULL;"
    )
}

pub fn hours_current(table: &str) -> String {
    format!(
        "
    SELECT drupal_location_id, weekday
    FROM {table}
    GROUP BY drupal_location_id, weekday
    HAVING SUM(CASE WHEN is_current THEN 1 ELSE 0 END) != 1;"
    )
}

pub fn hours_location_id(table: &str, branch_codes_table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT DISTINCT drupal_location_id
    FROM {table}
    WHERE date_of_change = '{date}'
        AND drupal_location_id NOT IN (
            SELECT drupal_code FROM {branch_codes_table});"
    )
}

pub fn closures_count(table: &str, date: NaiveDate) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE polling_date = '{date}';")
}

pub fn closures_location_id(table: &str, branch_codes_table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT DISTINCT drupal_location_id
    FROM {table}
    WHERE polling_date = '{date}'
        AND drupal_location_id IS NOT NULL
        AND drupal_location_id NOT IN (
            SELECT drupal_code FROM {branch_codes_table});"
    )
}

// ---- ezproxy ----

pub fn ezproxy_count(table: &str, date: NaiveDate) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE date = '{date}';")
}

pub fn ezproxy_duplicate(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT session_id, patron_id, domain
    FROM {table}
    WHERE date = '{date}'
    GROUP BY session_id, patron_id, domain
    HAVING COUNT(*) > 1;"
    )
}

// ---- overdrive ----

/// Checksums that appear on more than one row on `date`.
pub fn overdrive_duplicate(table: &str, date: NaiveDate) -> String {
    format!(
        "
    SELECT transaction_checksum
    FROM {table}
    WHERE transaction_et = '{date}'
    GROUP BY transaction_checksum
    HAVING COUNT(*) > 1;"
    )
}

pub fn overdrive_duplicate_platform(table: &str, date: NaiveDate, checksum: &str) -> String {
    let checksum = quote_literal(checksum);
    format!(
        "
    SELECT DISTINCT platform
    FROM {table}
    WHERE transaction_et = '{date}'
        AND transaction_checksum = '{checksum}';"
    )
}
