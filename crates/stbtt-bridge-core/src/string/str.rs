//! NUL-terminated string length.

/// Returns the number of bytes before the first NUL in `s`.
///
/// If `s` holds no NUL, returns `s.len()`.
pub fn string_length(s: &[u8]) -> usize {
    s.iter().position(|&b| b == 0).unwrap_or(s.len())
}

/// Length of the string in `s`, scanning no further than the slice.
///
/// Returns `(len, terminated)`, where `terminated` says whether a NUL was seen.
pub fn bounded_string_length(s: &[u8]) -> (usize, bool) {
    match s.iter().position(|&b| b == 0) {
        Some(len) => (len, true),
        None => (s.len(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_stops_at_first_nul() {
        assert_eq!(string_length(b"hello\0world\0"), 5);
        assert_eq!(string_length(b"\0"), 0);
        assert_eq!(string_length(b"glyf\0"), 4);
    }

    #[test]
    fn unterminated_slice_reports_full_length() {
        assert_eq!(string_length(b"abc"), 3);
        assert_eq!(bounded_string_length(b"abc"), (3, false));
        assert_eq!(bounded_string_length(b"ab\0c"), (2, true));
        assert_eq!(bounded_string_length(b""), (0, false));
    }
}
