//! SQL text for every check.
//!
//! Builders are pure `(params) -> String` functions grouped by the database
//! they target. Table names passed in already carry the run's table suffix.
//! Every statement is a `SELECT`.

pub mod envisionware;
pub mod redshift;
pub mod sierra;

/// Escape a value for embedding inside a single-quoted SQL literal.
pub(crate) fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_literal_doubles_single_quotes() {
        assert_eq!(quote_literal("abc"), "abc");
        assert_eq!(quote_literal("o'neil"), "o''neil");
    }
}
