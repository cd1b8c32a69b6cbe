//! Scheduler ↔ now-playing correlation.

use crate::protocol::NextEntry;
use crate::title;
use crate::upcoming::find_last;

/// Outcome of [`correlate`]. Both fields are `None` when nothing matched,
/// which is a normal state (startup, empty metadata).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Correlation {
    pub playlist: Option<String>,
    pub matched: Option<NextEntry>,
}

/// Find the scheduler announcement for the current title and report its
/// playlist.
///
/// Same tie-break as the upcoming queue: the last matching announcement wins,
/// since looped playlists repeat titles. Two distinct tracks sharing a
/// normalized title cannot be told apart.
pub fn correlate(entries: &[NextEntry], current_title: Option<&str>) -> Correlation {
    let key = title::normalize(current_title.unwrap_or(""));
    if key.is_empty() || entries.is_empty() {
        return Correlation::default();
    }

    match find_last(entries, &key) {
        Some(i) => {
            let entry = entries[i].clone();
            Correlation {
                playlist: Some(entry.playlist.clone()),
                matched: Some(entry),
            }
        }
        None => Correlation::default(),
    }
}
