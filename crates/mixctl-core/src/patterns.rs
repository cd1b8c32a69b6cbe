//! Registered line patterns.
//!
//! Log formats drift between engine and scheduler releases, so the regexes
//! are data: each extractor walks a [`RuleSet`] of named [`LineRule`]s and
//! takes the first rule that matches. The built-in rules below can be
//! extended or replaced from the `[patterns]` config table without touching
//! the reconstruction code.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::PatternsConfig;
use crate::error::PatternError;
use crate::timestamp::split_leading_timestamp;

/// Engine announcement of a track being prepared for air.
pub const DEFAULT_PREPROCESS_PATTERN: &str = r"(?i)\bpreprocess:\s*(?P<rest>.+?)\s*$";

/// Engine marker for a new source going on air.
pub const DEFAULT_STREAM_START_PATTERN: &str =
    r"(?i)\bstream(?:ing)?[ _-]?start(?:ed)?\b";

/// Component tag the scheduler's announcement subsystem logs under.
pub const DEFAULT_SCHEDULER_COMPONENT: &str = "scheduler.announce";

const TIMESTAMP_FIELD: &str =
    r"\d{4}[-/]\d{2}[-/]\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?";

const LEVEL_FIELD: &str = r"(?:\[?(?:TRACE|DEBUG|INFO|NOTICE|WARN|WARNING|ERROR|CRITICAL)\]?\s+)?";

/// Build the structured NEXT-line regex for a scheduler component tag.
///
/// `2025-01-14 08:15:02,123 INFO [scheduler.announce] NEXT title="…" playlist="…"`
pub fn scheduler_next_pattern(component: &str) -> String {
    format!(
        r#"^(?P<ts>{ts})\s+{level}\[(?P<component>{component})\]\s+NEXT\s+title="(?P<title>(?:[^"\\]|\\.)*)"\s+playlist="(?P<playlist>(?:[^"\\]|\\.)*)""#,
        ts = TIMESTAMP_FIELD,
        level = LEVEL_FIELD,
        component = regex::escape(component),
    )
}

/// One named pattern plus the function turning its captures into a value.
pub struct LineRule<T> {
    name: String,
    regex: Regex,
    extract: fn(&Captures<'_>) -> Option<T>,
}

impl<T> LineRule<T> {
    pub fn new(
        kind: &'static str,
        name: impl Into<String>,
        pattern: &str,
        required_groups: &[&'static str],
        extract: fn(&Captures<'_>) -> Option<T>,
    ) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Invalid {
            kind,
            pattern: pattern.to_string(),
            source,
        })?;

        for group in required_groups {
            if !regex.capture_names().flatten().any(|n| n == *group) {
                return Err(PatternError::MissingGroup {
                    kind,
                    pattern: pattern.to_string(),
                    group,
                });
            }
        }

        Ok(Self {
            name: name.into(),
            regex,
            extract,
        })
    }

    pub fn apply(&self, line: &str) -> Option<T> {
        let caps = self.regex.captures(line)?;
        (self.extract)(&caps)
    }
}

impl<T> std::fmt::Debug for LineRule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineRule")
            .field("name", &self.name)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Ordered list of rules; the first rule producing a value wins.
#[derive(Debug)]
pub struct RuleSet<T> {
    rules: Vec<LineRule<T>>,
}

impl<T> RuleSet<T> {
    pub fn new(rules: Vec<LineRule<T>>) -> Self {
        Self { rules }
    }

    pub fn first_match(&self, line: &str) -> Option<T> {
        self.rules.iter().find_map(|rule| rule.apply(line))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Fields of one scheduler NEXT announcement, still raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextFields {
    pub ts_raw: String,
    pub title_raw: String,
    pub playlist: String,
}

/// A stream-start hit, with an in-line timestamp if the rule captured one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStartHit {
    pub ts_raw: Option<String>,
}

/// All compiled rule sets used by the extractors.
#[derive(Debug)]
pub struct LogPatterns {
    pub preprocess: RuleSet<String>,
    pub next: RuleSet<NextFields>,
    pub stream_start: RuleSet<StreamStartHit>,
}

impl LogPatterns {
    pub fn from_config(cfg: &PatternsConfig) -> Result<Self, PatternError> {
        let preprocess = cfg
            .preprocess
            .iter()
            .enumerate()
            .map(|(i, p)| {
                LineRule::new("preprocess", format!("preprocess#{i}"), p, &["rest"], |c| {
                    c.name("rest").map(|m| m.as_str().trim().to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut next = vec![LineRule::new(
            "scheduler",
            format!("next[{}]", cfg.scheduler_component),
            &scheduler_next_pattern(&cfg.scheduler_component),
            &["ts", "title", "playlist"],
            next_fields,
        )?];
        for (i, p) in cfg.scheduler_next_extra.iter().enumerate() {
            next.push(LineRule::new(
                "scheduler",
                format!("next-extra#{i}"),
                p,
                &["ts", "title", "playlist"],
                next_fields,
            )?);
        }

        let stream_start = cfg
            .stream_start
            .iter()
            .enumerate()
            .map(|(i, p)| {
                LineRule::new("stream_start", format!("stream_start#{i}"), p, &[], |c| {
                    Some(StreamStartHit {
                        ts_raw: c.name("ts").map(|m| m.as_str().to_string()),
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            preprocess: RuleSet::new(preprocess),
            next: RuleSet::new(next),
            stream_start: RuleSet::new(stream_start),
        })
    }

    /// The built-in rule sets.
    pub fn builtin() -> Self {
        Self::from_config(&PatternsConfig::default()).expect("built-in log patterns compile")
    }
}

fn next_fields(c: &Captures<'_>) -> Option<NextFields> {
    Some(NextFields {
        ts_raw: c.name("ts")?.as_str().to_string(),
        title_raw: unescape_quoted(c.name("title")?.as_str()),
        playlist: unescape_quoted(c.name("playlist")?.as_str()),
    })
}

fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn compose_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<service>[A-Za-z0-9][\w.-]*)\s+\|\s?").expect("compose prefix regex compiles")
    })
}

/// A log line with its docker timestamp and compose service prefix split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLine<'a> {
    pub service: Option<&'a str>,
    pub docker_ts: Option<&'a str>,
    pub body: &'a str,
}

/// Split a compose `name  | ` prefix from the start of a line.
pub fn strip_compose_prefix(line: &str) -> (Option<&str>, &str) {
    match compose_prefix_re().captures(line) {
        Some(caps) => {
            let end = caps.get(0).map_or(0, |m| m.end());
            (caps.name("service").map(|m| m.as_str()), &line[end..])
        }
        None => (None, line),
    }
}

/// Strip the docker `--timestamps` token, a compose service prefix and a
/// trailing `\r` from a line.
///
/// Compose puts the service name before the docker timestamp
/// (`scheduler  | 2025-…Z msg`); plain `docker logs` output piped through a
/// compose-attached collector has it after (`2025-…Z scheduler  | msg`).
/// Both orders are accepted.
pub fn split_line(line: &str) -> SplitLine<'_> {
    let line = line.trim_end_matches('\r');
    let (service, rest) = strip_compose_prefix(line);
    let (docker_ts, rest) = split_leading_timestamp(rest);
    let (service, body) = match service {
        Some(name) => (Some(name), rest),
        None => strip_compose_prefix(rest),
    };
    SplitLine {
        service,
        docker_ts,
        body,
    }
}
