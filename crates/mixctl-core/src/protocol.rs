use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

/// Which log stream a result was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    EngineLogs,
    SchedulerLogs,
}

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Plain forward scan of the tail.
    Scan,
    /// Positioned after the last occurrence of the current title.
    AfterCurrent,
    /// Current title absent: approximated from the end of the tail.
    FallbackTail,
    SourceUnavailable,
    NoData,
}

impl Strategy {
    pub fn for_error(err: &TimelineError) -> Self {
        match err {
            TimelineError::SourceUnavailable(_) => Self::SourceUnavailable,
            TimelineError::NoDataFound(_) => Self::NoData,
        }
    }
}

/// One cleaned title from an engine preprocess announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTitle {
    /// Payload as matched, before cleaning.
    pub raw: String,
    /// Cleaned display title.
    pub title: String,
}

/// One scheduler NEXT announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextEntry {
    pub ts_raw: String,
    /// `None` when `ts_raw` did not parse; such entries still keep their
    /// log position.
    pub ts: Option<DateTime<Utc>>,
    pub title_raw: String,
    pub title_norm: String,
    pub playlist: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlesReport {
    pub ok: bool,
    pub origin: Origin,
    pub strategy: Strategy,
    pub error: Option<String>,
    pub titles: Vec<ExtractedTitle>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextEntriesReport {
    pub ok: bool,
    pub origin: Origin,
    pub strategy: Strategy,
    pub error: Option<String>,
    pub entries: Vec<NextEntry>,
    pub count: usize,
}

/// Forward queue after the current title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingReport<T> {
    pub ok: bool,
    pub origin: Origin,
    pub strategy: Strategy,
    pub current_title: Option<String>,
    pub current_title_found: bool,
    pub error: Option<String>,
    pub upcoming: Vec<T>,
}

impl<T> UpcomingReport<T> {
    pub fn failed(origin: Origin, current_title: Option<&str>, err: &TimelineError) -> Self {
        Self {
            ok: false,
            origin,
            strategy: Strategy::for_error(err),
            current_title: current_title.map(str::to_string),
            current_title_found: false,
            error: Some(err.to_string()),
            upcoming: Vec::new(),
        }
    }
}

/// Playlist of the scheduler entry matching the current title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistReport {
    pub ok: bool,
    pub origin: Origin,
    pub strategy: Strategy,
    pub current_title: Option<String>,
    pub playlist: Option<String>,
    pub matched: Option<NextEntry>,
    pub error: Option<String>,
}

/// Most recent stream-start marker in the engine tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStartReport {
    pub ok: bool,
    pub origin: Origin,
    pub strategy: Strategy,
    pub found: bool,
    pub line: Option<String>,
    pub ts_raw: Option<String>,
    pub ts: Option<DateTime<Utc>>,
    /// Seconds between the marker and the evaluation instant.
    pub age_s: Option<i64>,
    pub recent: bool,
    pub window_s: u64,
    pub error: Option<String>,
}
