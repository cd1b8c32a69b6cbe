//! Engine log: most recent stream-start marker, used as a recency signal.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::patterns::{split_line, LogPatterns};
use crate::protocol::{Origin, StreamStartReport, Strategy};
use crate::tail::LogTail;
use crate::timestamp::{find_inline_timestamp, parse_log_timestamp};

/// Default recency window, seconds.
pub const DEFAULT_RECENCY_WINDOW_SECS: u64 = 10;

/// Find the last stream-start line in `tail` and judge whether it happened
/// within `window_s` seconds before `now`.
///
/// The docker prefix timestamp is preferred, then one captured by the rule
/// (`ts` group), then a timestamp at the start of the line body.
pub fn detect_stream_start(
    tail: &LogTail,
    patterns: &LogPatterns,
    window_s: u64,
    now: DateTime<Utc>,
) -> StreamStartReport {
    let mut report = StreamStartReport {
        ok: true,
        origin: Origin::EngineLogs,
        strategy: Strategy::Scan,
        found: false,
        line: None,
        ts_raw: None,
        ts: None,
        age_s: None,
        recent: false,
        window_s,
        error: None,
    };

    let text = match tail.text() {
        Ok(t) => t,
        Err(err) => {
            report.ok = false;
            report.strategy = Strategy::for_error(&err);
            report.error = Some(err.to_string());
            return report;
        }
    };

    let mut last = None;
    for line in text.lines() {
        let split = split_line(line);
        if let Some(hit) = patterns.stream_start.first_match(split.body) {
            let ts_raw = split
                .docker_ts
                .map(str::to_string)
                .or(hit.ts_raw)
                .or_else(|| find_inline_timestamp(split.body).map(str::to_string));
            last = Some((line.trim_end_matches('\r').to_string(), ts_raw));
        }
    }

    let Some((line, ts_raw)) = last else {
        debug!("[engine] no stream-start marker in tail");
        return report;
    };

    let ts = ts_raw.as_deref().and_then(parse_log_timestamp);
    report.found = true;
    report.line = Some(line);
    report.ts_raw = ts_raw;
    report.ts = ts;

    if let Some(ts) = ts {
        let age = now.signed_duration_since(ts);
        report.age_s = Some(age.num_seconds());
        let window_ms = i64::try_from(window_s.saturating_mul(1000)).unwrap_or(i64::MAX);
        report.recent = (0..=window_ms).contains(&age.num_milliseconds());
    }

    report
}
