//! Envisionware PC reservation queries (MySQL).

use chrono::NaiveDate;

pub fn pc_reserve_count(date: NaiveDate) -> String {
    format!("SELECT COUNT(pcrKey) FROM strad_bci WHERE DATE(pcrDateTime) = '{date}';")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pc_reserve_count_filters_on_reservation_day() {
        let query = pc_reserve_count("2023-05-31".parse().unwrap());
        assert_eq!(
            query,
            "SELECT COUNT(pcrKey) FROM strad_bci WHERE DATE(pcrDateTime) = '2023-05-31';"
        );
    }
}
