use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// XMLTV timestamp layout (`YYYYMMDDHHmmSS +HHMM`).
const XMLTV_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Get the current time as a UTC datetime.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a UTC datetime as ISO 8601 with a `Z` suffix, as guide endpoints expect.
pub fn to_iso_utc(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reformat an upstream guide timestamp into XMLTV form.
///
/// Upstream timestamps are loosely ISO 8601: a literal `Z` may stand in for
/// the offset, and fractional seconds may carry an offset with or without a
/// colon. The source offset is kept as-is in the output.
///
/// Returns an empty string when the value cannot be parsed; callers treat
/// that as a missing timestamp.
pub fn format_xmltv_timestamp(raw: &str) -> String {
    match parse_guide_timestamp(raw) {
        Some(dt) => dt.format(XMLTV_FORMAT).to_string(),
        None => {
            if !raw.trim().is_empty() {
                tracing::warn!(timestamp = raw, "Could not parse guide timestamp");
            }
            String::new()
        }
    }
}

/// Parse an upstream guide timestamp, see [`format_xmltv_timestamp`].
pub fn parse_guide_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize_timestamp(raw.trim())?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt);
    }

    for layout in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, layout) {
            return Some(dt);
        }
    }

    // No offset at all: read as UTC
    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, layout) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Apply the `Z` and fractional-seconds fixups ahead of parsing.
fn normalize_timestamp(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }

    let mut value = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => s.to_string(),
    };

    if let Some(dot) = value.find(['.', ',']) {
        let (head, fraction) = value.split_at(dot);
        let offset = fraction
            .find(['+', '-'])
            .map(|pos| fraction[pos..].replace(':', ""))
            .unwrap_or_default();
        value = format!("{head}{offset}");
    }

    Some(value)
}
