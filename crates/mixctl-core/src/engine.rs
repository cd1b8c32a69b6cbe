//! Engine log: preprocess announcements.
//!
//! The engine logs every file it prepares before air, e.g.
//!
//! ```text
//! preprocess: 1. Daddy Freddy & Tenor Fly - Go Freddy Go.mp3 -> safe_3f9a0c1d2e.wav (silence=0.4s LUFS=-14.2)
//! ```
//!
//! Read oldest-first, those lines are the best available picture of the
//! play order.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::TimelineError;
use crate::patterns::{split_line, LogPatterns};
use crate::protocol::{ExtractedTitle, Origin, Strategy, TitlesReport, UpcomingReport};
use crate::tail::LogTail;
use crate::title;
use crate::upcoming::reconstruct;

fn leading_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\s*[.)]\s*").expect("index regex compiles"))
}

fn trailing_paren_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s*\((?P<inner>[^()]*)\)\s*$").expect("parenthetical regex compiles")
    })
}

/// A parenthetical right after an audio extension is a processing note,
/// never part of the title.
fn annotated_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let exts = title::AUDIO_EXTENSIONS.join("|");
        Regex::new(&format!(r"(?i)^(?P<file>.*\.(?:{exts}))\s*\([^()]*\)\s*$"))
            .expect("annotated file regex compiles")
    })
}

fn metrics_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)=|\b(?:lufs|dbfs|db|silence|loudness|gain|peak)\b")
            .expect("metrics regex compiles")
    })
}

/// Turn a preprocess payload into a display title.
///
/// `"1. Artist - Title.mp3 -> safe_ab12cd34.wav (silence=…)"` → `"Artist - Title"`.
/// Returns `None` when nothing is left.
pub fn clean_preprocess_title(rest: &str) -> Option<String> {
    let s = rest.trim();
    if s.is_empty() {
        return None;
    }

    let s = leading_index_re().replace(s, "");
    let s = match s.split_once("->") {
        Some((left, _generated)) => left.trim(),
        None => s.trim(),
    };

    // Without an extension in front, only measurement annotations go;
    // "(Remix)" is part of the title.
    let s = if let Some(file) = annotated_file_re().captures(s).and_then(|c| c.name("file")) {
        file.as_str().trim()
    } else {
        match trailing_paren_re().captures(s) {
            Some(caps) if metrics_re().is_match(&caps["inner"]) => {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(s.len());
                s[..start].trim()
            }
            _ => s,
        }
    };

    let cleaned = title::display(s);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Scan an engine tail for preprocess announcements, oldest first.
pub fn extract_preprocess_titles(tail: &LogTail, patterns: &LogPatterns) -> TitlesReport {
    let text = match tail.text() {
        Ok(t) => t,
        Err(err) => {
            return TitlesReport {
                ok: false,
                origin: Origin::EngineLogs,
                strategy: Strategy::for_error(&err),
                error: Some(err.to_string()),
                titles: Vec::new(),
                count: 0,
            }
        }
    };

    let mut lines = 0usize;
    let titles: Vec<ExtractedTitle> = text
        .lines()
        .inspect(|_| lines += 1)
        .filter_map(|line| {
            let raw = patterns.preprocess.first_match(split_line(line).body)?;
            let title = clean_preprocess_title(&raw)?;
            Some(ExtractedTitle { raw, title })
        })
        .collect();

    debug!(
        "[engine] {} preprocess titles in {} lines",
        titles.len(),
        lines
    );

    TitlesReport {
        ok: true,
        origin: Origin::EngineLogs,
        strategy: Strategy::Scan,
        error: None,
        count: titles.len(),
        titles,
    }
}

/// Titles expected after `current_title`, from engine preprocess lines.
pub fn upcoming_from_engine(
    tail: &LogTail,
    patterns: &LogPatterns,
    current_title: Option<&str>,
    limit: usize,
    fallback_factor: usize,
) -> UpcomingReport<String> {
    let report = extract_preprocess_titles(tail, patterns);
    if !report.ok {
        let err = TimelineError::SourceUnavailable(report.error.unwrap_or_default());
        return UpcomingReport::failed(Origin::EngineLogs, current_title, &err);
    }

    let titles: Vec<String> = report
        .titles
        .into_iter()
        .map(|t| t.title)
        .filter(|t| !t.trim().is_empty())
        .collect();
    if titles.is_empty() {
        let err = TimelineError::NoDataFound("no preprocess titles found".to_string());
        return UpcomingReport::failed(Origin::EngineLogs, current_title, &err);
    }

    match reconstruct(&titles, current_title, limit, fallback_factor) {
        Ok(up) => UpcomingReport {
            ok: true,
            origin: Origin::EngineLogs,
            strategy: up.strategy,
            current_title: current_title.map(str::to_string),
            current_title_found: up.found,
            error: None,
            upcoming: up.items,
        },
        Err(err) => UpcomingReport::failed(Origin::EngineLogs, current_title, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_indexed_arrow_payload() {
        assert_eq!(
            clean_preprocess_title(
                "1. Daddy Freddy & Tenor Fly - Go Freddy Go.mp3 -> safe_3f9a0c1d2e.wav (silence=0.4s LUFS=-14.2)"
            )
            .as_deref(),
            Some("Daddy Freddy & Tenor Fly - Go Freddy Go")
        );
    }

    #[test]
    fn test_clean_underscored_payload() {
        assert_eq!(
            clean_preprocess_title("derrick_howard_-_behold_i_live_[1973].mp3 -> safe_00ff00ff.wav (...)")
                .as_deref(),
            Some("derrick howard - behold i live [1973]")
        );
    }

    #[test]
    fn test_clean_paren_index_and_path() {
        assert_eq!(
            clean_preprocess_title("12) /srv/music/Dub/King_Tubby_-_Dub_Fire.flac").as_deref(),
            Some("King Tubby - Dub Fire")
        );
    }

    #[test]
    fn test_metrics_paren_dropped_but_title_paren_kept() {
        assert_eq!(
            clean_preprocess_title("Song (Extended Mix).mp3 (gain -3 dB)").as_deref(),
            Some("Song (Extended Mix)")
        );
        assert_eq!(
            clean_preprocess_title("Song (Extended Mix).mp3").as_deref(),
            Some("Song (Extended Mix)")
        );
    }

    #[test]
    fn test_annotation_after_extension_always_dropped() {
        assert_eq!(
            clean_preprocess_title("derrick_howard_-_behold_i_live_[1973].mp3 (...)").as_deref(),
            Some("derrick howard - behold i live [1973]")
        );
        assert_eq!(clean_preprocess_title("Song.mp3 (cached)").as_deref(), Some("Song"));
        assert_eq!(
            clean_preprocess_title("2. Song (Extended Mix).FLAC (resampled)").as_deref(),
            Some("Song (Extended Mix)")
        );
        // Same track, same key, whatever the annotation.
        assert_eq!(
            clean_preprocess_title("A - B.mp3 (cached)"),
            clean_preprocess_title("A - B.mp3 -> safe_0a0a0a0a.wav (LUFS=-14)")
        );
    }

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_preprocess_title(""), None);
        assert_eq!(clean_preprocess_title("3. "), None);
        assert_eq!(clean_preprocess_title("-> safe_1234abcd.wav"), None);
    }

    #[test]
    fn test_extract_ignores_other_lines() {
        let text = "\
2025-01-14T08:00:00.000000001Z engine booting
2025-01-14T08:00:01.000000001Z preprocess: 1. A.mp3 -> safe_aaaaaaaa.wav (LUFS=-14)
2025-01-14T08:00:02.000000001Z decoder: warming up
2025-01-14T08:00:03.000000001Z preprocess: B_-_C.mp3
";
        let report = extract_preprocess_titles(&LogTail::from_raw(text), &LogPatterns::builtin());
        assert!(report.ok);
        assert_eq!(report.strategy, Strategy::Scan);
        let titles: Vec<_> = report.titles.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B - C"]);
        assert_eq!(report.titles[0].raw, "1. A.mp3 -> safe_aaaaaaaa.wav (LUFS=-14)");
        assert_eq!(report.count, 2);
    }

    #[test]
    fn test_extract_empty_logs() {
        let report = extract_preprocess_titles(&LogTail::from_raw(""), &LogPatterns::builtin());
        assert!(!report.ok);
        assert_eq!(report.error.as_deref(), Some("empty logs"));
        assert!(report.titles.is_empty());
        assert_eq!(report.strategy, Strategy::SourceUnavailable);
    }

    #[test]
    fn test_upcoming_no_titles_is_no_data() {
        let tail = LogTail::from_raw("nothing relevant\nstill nothing\n");
        let up = upcoming_from_engine(&tail, &LogPatterns::builtin(), Some("A"), 5, 4);
        assert!(!up.ok);
        assert_eq!(up.strategy, Strategy::NoData);
        assert_eq!(up.error.as_deref(), Some("no preprocess titles found"));
    }

    #[test]
    fn test_upcoming_after_last_current() {
        let text = ["A", "B", "C", "A", "D"]
            .iter()
            .map(|t| format!("preprocess: {t}.mp3\n"))
            .collect::<String>();
        let up = upcoming_from_engine(&LogTail::from_raw(text), &LogPatterns::builtin(), Some("A"), 3, 4);
        assert!(up.ok);
        assert!(up.current_title_found);
        assert_eq!(up.strategy, Strategy::AfterCurrent);
        assert_eq!(up.upcoming, vec!["D".to_string()]);
    }
}
