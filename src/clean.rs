//! ANSI/CSI/OSC escape sequence stripping for sentinel detection.
//!
//! This is only ever applied to the copy of output the pipeline inspects
//! for terminators, the status sentinel, and the prompt. The raw bytes
//! returned to the caller keep any color/cursor sequences a shell emitted.

use regex::Regex;
use std::sync::LazyLock;

/// Matches `ESC` followed by one of `[ ] ( ) # ; ?`, an optional run of
/// digits/semicolons, and a single final byte from the documented set.
/// Ported verbatim from the upstream `term.Clean` grammar rather than
/// tightened or broadened -- malformed sequences that fall outside it are
/// intentionally left alone.
static ESCAPE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b[\[\]()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]")
        .expect("invalid terminal escape regex")
});

/// Strip terminal control sequences from `input`, returning a fresh string.
#[must_use]
pub fn clean(input: &str) -> String {
    if !input.contains('\x1b') {
        return input.to_string();
    }
    ESCAPE_SEQUENCE.replace_all(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(clean("hello world\n"), "hello world\n");
    }

    #[test]
    fn strips_csi_color_codes() {
        let input = "\x1b[31mred\x1b[0m plain";
        assert_eq!(clean(input), "red plain");
    }

    #[test]
    fn strips_cursor_movement() {
        let input = "a\x1b[2Kb\x1b[1;1Hc";
        assert_eq!(clean(input), "abc");
    }

    #[test]
    fn is_idempotent() {
        let input = "\x1b[31mred\x1b[0m \x1b[Kstatus:0";
        let once = clean(input);
        let twice = clean(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn round_trip_law_no_escapes() {
        let samples = ["plain", "status:0", "  spaced \t text  "];
        for s in samples {
            assert_eq!(clean(s), s);
        }
    }
}
