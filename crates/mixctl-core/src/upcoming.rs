//! Upcoming-queue reconstruction.
//!
//! Logs are a sliding, lossy window and playlists loop, so the current track
//! can appear several times or not at all. The rule is: position after the
//! *last* occurrence of the current title; if it is not in the window, fall
//! back to the tail end and say so.

use std::collections::HashSet;

use crate::error::TimelineError;
use crate::protocol::{NextEntry, Strategy};
use crate::title;

/// Multiplier applied to `limit` to size the fallback tail window.
pub const DEFAULT_FALLBACK_FACTOR: usize = 4;

/// Something that can be positioned in a reconstructed timeline.
pub trait TimelineItem {
    /// Key used for both position-finding and deduplication.
    fn timeline_key(&self) -> String;

    /// Key the current title is compared with.
    fn current_key(current: &str) -> String;
}

/// Engine titles compare by exact trimmed text.
impl TimelineItem for String {
    fn timeline_key(&self) -> String {
        self.trim().to_string()
    }

    fn current_key(current: &str) -> String {
        current.trim().to_string()
    }
}

/// Scheduler entries compare by normalized title.
impl TimelineItem for NextEntry {
    fn timeline_key(&self) -> String {
        self.title_norm.clone()
    }

    fn current_key(current: &str) -> String {
        title::normalize(current)
    }
}

/// Result of [`reconstruct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upcoming<T> {
    /// Whether the current title was located.
    pub found: bool,
    pub strategy: Strategy,
    /// Index in the input sequence where the candidate window begins.
    pub window_start: usize,
    pub items: Vec<T>,
}

/// Index of the last element whose key equals `key`.
pub fn find_last<T: TimelineItem>(seq: &[T], key: &str) -> Option<usize> {
    if key.is_empty() {
        return None;
    }
    seq.iter().rposition(|item| item.timeline_key() == key)
}

/// Stable dedupe: first occurrence wins, empty keys are dropped, at most
/// `limit` items are kept.
pub fn dedupe_keep_order<T: TimelineItem + Clone>(items: &[T], limit: usize) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| {
            let key = item.timeline_key();
            !key.is_empty() && seen.insert(key)
        })
        .take(limit)
        .cloned()
        .collect()
}

/// Derive the deduplicated forward queue after `current`.
///
/// `limit == 0` is treated as 1. An empty sequence is reported as
/// [`TimelineError::NoDataFound`] rather than an empty success.
pub fn reconstruct<T: TimelineItem + Clone>(
    seq: &[T],
    current: Option<&str>,
    limit: usize,
    fallback_factor: usize,
) -> Result<Upcoming<T>, TimelineError> {
    if seq.is_empty() {
        return Err(TimelineError::NoDataFound("no titles found".to_string()));
    }
    let limit = limit.max(1);

    let position = current
        .map(T::current_key)
        .and_then(|key| find_last(seq, &key));

    let (found, strategy, window_start) = match position {
        Some(i) => (true, Strategy::AfterCurrent, i + 1),
        None => {
            let window = limit.saturating_mul(fallback_factor.max(1));
            (false, Strategy::FallbackTail, seq.len().saturating_sub(window))
        }
    };

    Ok(Upcoming {
        found,
        strategy,
        window_start,
        items: dedupe_keep_order(&seq[window_start..], limit),
    })
}
