//! HTTP date parsing
//!
//! `getlastmodified` values arrive in RFC 1123, RFC 850 or asctime form
//! depending on the server; `creationdate` is RFC 3339.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Tries RFC 1123, then RFC 850, then asctime.
pub(crate) fn parse_http_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, RFC850_FORMAT) {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    NaiveDateTime::parse_from_str(value, ASCTIME_FORMAT)
        .ok()
        .map(|parsed| Utc.from_utc_datetime(&parsed))
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
