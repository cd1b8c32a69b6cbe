use thiserror::Error;

/// Why a timeline could not be produced.
///
/// These travel inside the result structures as values; nothing in the
/// extraction path returns them to the HTTP layer as a failure status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// The log text could not be obtained (or came back empty).
    #[error("{0}")]
    SourceUnavailable(String),
    /// Logs were read but contained nothing the patterns recognise.
    #[error("{0}")]
    NoDataFound(String),
}

/// A configured log pattern failed to compile or lacks a required group.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {kind} pattern {pattern:?}: {source}")]
    Invalid {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{kind} pattern {pattern:?} has no named group `{group}`")]
    MissingGroup {
        kind: &'static str,
        pattern: String,
        group: &'static str,
    },
}
