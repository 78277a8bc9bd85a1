use chrono::{DateTime, NaiveDateTime, TimeZone};

/// Fixed-width, zero-padded prefix format. Lexicographic order of formatted
/// prefixes equals chronological order.
pub const PREFIX_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Format the archive-name prefix for a point in time.
pub fn format_prefix<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(PREFIX_FORMAT).to_string()
}

/// Parse a prefix back into a naive timestamp. Returns `None` when the
/// segment was not produced by [`format_prefix`].
pub fn parse_prefix(prefix: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(prefix, PREFIX_FORMAT).ok()
}
