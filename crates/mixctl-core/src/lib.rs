//! Timeline reconstruction from engine and scheduler container logs.

pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod patterns;
pub mod platform;
pub mod protocol;
pub mod scheduler;
pub mod stream_start;
pub mod tail;
pub mod timestamp;
pub mod title;
pub mod upcoming;

pub use config::Config;
pub use error::{PatternError, TimelineError};
pub use patterns::LogPatterns;
pub use protocol::*;
pub use tail::LogTail;
