//! Tolerant timestamp parsing for log prefixes and container metadata.
//!
//! Docker stamps lines with nanosecond precision (`2025-01-14T08:15:02.123456789Z`),
//! python-style loggers write `2025-01-14 08:15:02,123`, and some engines use
//! slashes in the date. Everything is funnelled through one adapter that pads
//! or truncates the fractional part to microseconds before handing it to chrono.

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use std::sync::OnceLock;

const FRACTION_DIGITS: usize = 6;

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<y>\d{4})[-/](?P<mo>\d{2})[-/](?P<d>\d{2})[T ](?P<h>\d{2}):(?P<mi>\d{2}):(?P<s>\d{2})(?:[.,](?P<frac>\d+))?\s*(?P<tz>Z|z|[+-]\d{2}(?::?\d{2})?)?$",
        )
        .expect("timestamp regex compiles")
    })
}

/// Matches a docker `--timestamps` token at the very start of a line.
fn leading_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?\s")
            .expect("leading timestamp regex compiles")
    })
}

/// Matches an application timestamp at the start of a log body, optionally
/// bracketed: `[2025/01/14 08:15:02] …`, `2025-01-14 08:15:02,123 INFO …`.
fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[?(?P<ts>\d{4}[-/]\d{2}[-/]\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\]?(?:\s|$)",
        )
        .expect("inline timestamp regex compiles")
    })
}

/// Parse a log timestamp into UTC. Zone-less timestamps are taken as UTC.
///
/// Returns `None` for anything that does not look like a timestamp; callers
/// keep the raw text for display.
pub fn parse_log_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let caps = timestamp_re().captures(raw.trim())?;

    let frac = caps.name("frac").map(|m| m.as_str()).unwrap_or("");
    let frac = fixed_width_fraction(frac);

    let tz = match caps.name("tz").map(|m| m.as_str()) {
        None | Some("Z") | Some("z") => "+00:00".to_string(),
        Some(offset) => normalize_offset(offset),
    };

    let normalized = format!(
        "{}-{}-{}T{}:{}:{}.{}{}",
        &caps["y"], &caps["mo"], &caps["d"], &caps["h"], &caps["mi"], &caps["s"], frac, tz
    );

    DateTime::<FixedOffset>::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%:z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split a leading docker timestamp token from the rest of the line.
///
/// `"2025-01-14T08:15:02.1Z hello"` → `(Some("2025-01-14T08:15:02.1Z"), "hello")`.
pub fn split_leading_timestamp(line: &str) -> (Option<&str>, &str) {
    match leading_token_re().find(line) {
        Some(m) => {
            let token = line[..m.end()].trim_end();
            (Some(token), &line[m.end()..])
        }
        None => (None, line),
    }
}

/// Leading application timestamp of a log body, if any.
pub fn find_inline_timestamp(body: &str) -> Option<&str> {
    inline_re()
        .captures(body.trim_start())
        .and_then(|c| c.name("ts"))
        .map(|m| m.as_str())
}

fn fixed_width_fraction(frac: &str) -> String {
    let mut out: String = frac.chars().take(FRACTION_DIGITS).collect();
    while out.len() < FRACTION_DIGITS {
        out.push('0');
    }
    out
}

fn normalize_offset(offset: &str) -> String {
    let (sign, digits) = offset.split_at(1);
    let digits: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        2 => format!("{sign}{digits}:00"),
        4 => format!("{sign}{}:{}", &digits[..2], &digits[2..]),
        _ => format!("{sign}{digits}"),
    }
}
