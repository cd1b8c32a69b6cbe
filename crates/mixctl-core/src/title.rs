//! Track label cleaning.
//!
//! Engine and scheduler logs name tracks by whatever the playlist file was
//! called: full paths, `artist_-_title.mp3` style underscores, mixed case.
//! Two forms are derived from such a label:
//!
//! * [`display`]: case preserved, for presentation;
//! * [`normalize`]: lowercased matching key, used for every equality test
//!   between log sources and the now-playing title.
//!
//! Both are total and idempotent.

/// Audio extensions stripped from the end of a label (compared lowercase).
pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Case-preserving cleaned label.
pub fn display(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }

    let s = basename(s);
    let s = strip_audio_extensions(s);

    let s = s.replace("_-_", " - ").replace('_', " ");
    let s = collapse_whitespace(&s);
    // `x.mp3_` only exposes its extension once the underscore is gone.
    strip_audio_extensions(&s).to_string()
}

/// Lowercase matching key.
pub fn normalize(raw: &str) -> String {
    display(raw).to_lowercase()
}

/// Keep the final segment of anything that looks like a path.
fn basename(s: &str) -> &str {
    match s.rfind(['/', '\\']) {
        Some(pos) => s[pos + 1..].trim(),
        None => s,
    }
}

fn strip_audio_extensions(s: &str) -> &str {
    let mut rest = s.trim_end();
    while let Some(dot) = rest.rfind('.') {
        let ext = &rest[dot + 1..];
        if !AUDIO_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
        {
            break;
        }
        rest = rest[..dot].trim_end();
    }
    rest
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
