//! Normalization of catalog column lists into SELECT-safe column text.

/// Quote character used for reserved column names in source queries.
const QUOTE: char = '"';

/// Normalizes raw catalog column lists for embedding in a SELECT list.
///
/// Pre-existing quotes are stripped, then every standalone column whose name
/// matches a reserved word (case-insensitively) is re-quoted. Matching is
/// per column, so `Description` is never mistaken for `Desc`.
#[derive(Debug, Clone)]
pub struct ColumnFormatter {
    reserved: Vec<String>,
}

impl Default for ColumnFormatter {
    fn default() -> Self {
        Self::new(["Desc"])
    }
}

impl ColumnFormatter {
    /// Create a formatter quoting the given reserved words.
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// Format a raw comma-joined column list.
    ///
    /// A `Desc` column is quoted even when `Description` directly follows it.
    ///
    /// Idempotent: `format(&format(x)) == format(x)`.
    pub fn format(&self, raw: &str) -> String {
        let stripped: String = raw.chars().filter(|c| *c != QUOTE).collect();
        stripped
            .split(',')
            .map(|col| {
                let col = col.trim();
                if self.is_reserved(col) {
                    format!("{QUOTE}{col}{QUOTE}")
                } else {
                    col.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn is_reserved(&self, col: &str) -> bool {
        self.reserved.iter().any(|r| r.eq_ignore_ascii_case(col))
    }
}
