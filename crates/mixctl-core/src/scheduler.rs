//! Scheduler log: structured NEXT announcements.
//!
//! ```text
//! 2025-01-14 08:15:02,123 INFO [scheduler.announce] NEXT title="Artist - Title.mp3" playlist="morning"
//! ```

use tracing::debug;

use crate::correlate::correlate;
use crate::error::TimelineError;
use crate::patterns::{split_line, strip_compose_prefix, LogPatterns};
use crate::protocol::{
    NextEntriesReport, NextEntry, Origin, PlaylistReport, Strategy, UpcomingReport,
};
use crate::tail::LogTail;
use crate::timestamp::parse_log_timestamp;
use crate::title;
use crate::upcoming::reconstruct;

/// Scan a scheduler tail for NEXT announcements, in log order.
pub fn extract_next_entries(tail: &LogTail, patterns: &LogPatterns) -> NextEntriesReport {
    let text = match tail.text() {
        Ok(t) => t,
        Err(err) => {
            return NextEntriesReport {
                ok: false,
                origin: Origin::SchedulerLogs,
                strategy: Strategy::for_error(&err),
                error: Some(err.to_string()),
                entries: Vec::new(),
                count: 0,
            }
        }
    };

    let entries: Vec<NextEntry> = text
        .lines()
        .filter_map(|line| {
            // A scheduler stamp in docker's own format would be taken for the prefix.
            patterns
                .next
                .first_match(split_line(line).body)
                .or_else(|| {
                    let (_, stamped) = strip_compose_prefix(line.trim_end_matches('\r'));
                    patterns.next.first_match(stamped)
                })
        })
        .map(|fields| NextEntry {
            ts: parse_log_timestamp(&fields.ts_raw),
            title_norm: title::normalize(&fields.title_raw),
            ts_raw: fields.ts_raw,
            title_raw: fields.title_raw,
            playlist: fields.playlist,
        })
        .collect();

    let unparsed = entries.iter().filter(|e| e.ts.is_none()).count();
    debug!(
        "[scheduler] {} NEXT entries ({} with unparsed timestamps)",
        entries.len(),
        unparsed
    );

    NextEntriesReport {
        ok: true,
        origin: Origin::SchedulerLogs,
        strategy: Strategy::Scan,
        error: None,
        count: entries.len(),
        entries,
    }
}

/// Scheduler entries announced after the current title.
pub fn upcoming_from_scheduler(
    tail: &LogTail,
    patterns: &LogPatterns,
    current_title: Option<&str>,
    limit: usize,
    fallback_factor: usize,
) -> UpcomingReport<NextEntry> {
    let entries = match usable_entries(tail, patterns) {
        Ok(entries) => entries,
        Err(err) => return UpcomingReport::failed(Origin::SchedulerLogs, current_title, &err),
    };

    match reconstruct(&entries, current_title, limit, fallback_factor) {
        Ok(up) => UpcomingReport {
            ok: true,
            origin: Origin::SchedulerLogs,
            strategy: up.strategy,
            current_title: current_title.map(str::to_string),
            current_title_found: up.found,
            error: None,
            upcoming: up.items,
        },
        Err(err) => UpcomingReport::failed(Origin::SchedulerLogs, current_title, &err),
    }
}

/// Playlist the current title was scheduled from.
pub fn playlist_from_scheduler(
    tail: &LogTail,
    patterns: &LogPatterns,
    current_title: Option<&str>,
) -> PlaylistReport {
    let current = current_title.map(str::to_string);
    let report = extract_next_entries(tail, patterns);
    if !report.ok {
        return PlaylistReport {
            ok: false,
            origin: Origin::SchedulerLogs,
            strategy: report.strategy,
            current_title: current,
            playlist: None,
            matched: None,
            error: report.error,
        };
    }

    // No announcements in the window is a normal state, not a failure.
    let strategy = if report.entries.is_empty() {
        Strategy::NoData
    } else {
        Strategy::Scan
    };
    let c = correlate(&report.entries, current_title);
    PlaylistReport {
        ok: true,
        origin: Origin::SchedulerLogs,
        strategy,
        current_title: current,
        playlist: c.playlist,
        matched: c.matched,
        error: None,
    }
}

fn usable_entries(tail: &LogTail, patterns: &LogPatterns) -> Result<Vec<NextEntry>, TimelineError> {
    let report = extract_next_entries(tail, patterns);
    if !report.ok {
        return Err(TimelineError::SourceUnavailable(
            report.error.unwrap_or_default(),
        ));
    }
    if report.entries.is_empty() {
        return Err(TimelineError::NoDataFound(
            "no scheduler NEXT entries found".to_string(),
        ));
    }
    Ok(report.entries)
}
