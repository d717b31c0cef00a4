use time::format_description::well_known::Iso8601;
use time::macros::format_description;
use time::OffsetDateTime;

/// Render a millisecond epoch timestamp as an ISO-8601 string. Values
/// beyond the representable year range yield an empty string instead of a
/// panic, same as `to_date`.
pub fn to_iso8601(timestamp_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Iso8601::DEFAULT).ok())
        .unwrap_or_else(|| {
            tracing::warn!(timestamp_ms, "timestamp out of range, emitting empty time");
            String::new()
        })
}

/// Render the UTC date component (yyyy-mm-dd) of a millisecond timestamp.
/// Vendor-supplied timestamps can be garbage, so out-of-range values yield
/// an empty date instead of a panic.
pub fn to_date(timestamp_ms: i64) -> String {
    let format = format_description!("[year]-[month]-[day]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .ok()
        .and_then(|t| t.date().format(&format).ok())
        .unwrap_or_else(|| {
            tracing::warn!(timestamp_ms, "timestamp out of range, emitting empty date");
            String::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_is_utc_and_time_free() {
        // 2021-01-01T23:59:59.999Z
        assert_eq!(to_date(1_609_545_599_999), "2021-01-01");
        // one millisecond later rolls the date
        assert_eq!(to_date(1_609_545_600_000), "2021-01-02");
    }

    #[test]
    fn iso_rendering_includes_time() {
        assert!(to_iso8601(1_609_545_600_000).starts_with("2021-01-02T00:00:00"));
    }

    #[test]
    fn out_of_range_timestamps_do_not_panic() {
        assert_eq!(to_iso8601(i64::MAX), "");
        assert_eq!(to_iso8601(i64::MIN), "");
        assert_eq!(to_date(i64::MAX), "");
    }
}
