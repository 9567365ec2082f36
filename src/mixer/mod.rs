//! Mixer pipeline: definition, evaluation and streamed loading.

pub mod group;
pub mod guard;
pub mod scaler;
pub mod simple;
pub mod store;
pub mod text;

pub use group::MixerGroup;
pub use guard::{MixGuard, MixToken};
pub use scaler::Scaler;
pub use simple::{ControlScaler, Mixer, SimpleMixer};
pub use store::{MixerLock, MixerStore};
pub use text::{MixerAction, MixerTextBuffer, MixerTextHeader};

use crate::error::MixerParseError;

/// Split the next newline-terminated line off `text`.
///
/// Returns the line without its terminator and the number of bytes it used.
pub(crate) fn next_line(text: &[u8]) -> Result<(&str, usize), MixerParseError> {
    let end = text
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(MixerParseError::Incomplete)?;

    // a NUL before the newline is the end of the buffered text
    if text[..end].contains(&0) {
        return Err(MixerParseError::Incomplete);
    }

    let line = core::str::from_utf8(&text[..end]).map_err(|_| MixerParseError::Malformed)?;
    Ok((line.trim_end_matches('\r'), end + 1))
}

/// Body of a `T: ...` line, if the line carries tag `tag`.
pub(crate) fn tagged(line: &str, tag: char) -> Option<&str> {
    let mut chars = line.chars();
    if chars.next()? != tag || chars.next()? != ':' {
        return None;
    }
    Some(chars.as_str())
}

/// Parse exactly `N` whitespace separated integers.
pub(crate) fn int_fields<const N: usize>(body: &str) -> Result<[i32; N], MixerParseError> {
    let mut fields = [0i32; N];
    let mut words = body.split_ascii_whitespace();

    for field in fields.iter_mut() {
        *field = words
            .next()
            .ok_or(MixerParseError::Malformed)?
            .parse()
            .map_err(|_| MixerParseError::Malformed)?;
    }

    if words.next().is_some() {
        return Err(MixerParseError::Malformed);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_needs_terminator() {
        assert_eq!(next_line(b"M: 1"), Err(MixerParseError::Incomplete));
        assert_eq!(next_line(b"M: 1\nO:"), Ok(("M: 1", 5)));
        assert_eq!(next_line(b"Z:\r\n"), Ok(("Z:", 4)));
    }

    #[test]
    fn nul_ends_the_text() {
        assert_eq!(next_line(b"M: 1\0\n"), Err(MixerParseError::Incomplete));
    }

    #[test]
    fn tag_must_be_followed_by_colon() {
        assert_eq!(tagged("M: 2", 'M'), Some(" 2"));
        assert_eq!(tagged("MX 2", 'M'), None);
        assert_eq!(tagged("S: 0 0", 'M'), None);
        assert_eq!(tagged("", 'M'), None);
    }

    #[test]
    fn int_fields_counts_exactly() {
        assert_eq!(int_fields::<3>(" 1 -2  3"), Ok([1, -2, 3]));
        assert_eq!(int_fields::<3>(" 1 2"), Err(MixerParseError::Malformed));
        assert_eq!(int_fields::<2>(" 1 2 3"), Err(MixerParseError::Malformed));
        assert_eq!(int_fields::<1>(" x"), Err(MixerParseError::Malformed));
    }
}
