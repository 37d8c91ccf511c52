//! Post-processing: deterministic cleanup of VLM-generated captions.
//!
//! Every record in the report is framed as `url: caption` followed by a
//! blank line. A caption that contains newlines, or arrives wrapped in
//! quotes or prefixed with "Caption:", breaks that framing or reads badly.
//! These rules fix such model quirks without touching the description
//! itself.
//!
//! Rules (applied in order):
//! 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 2. Collapse every whitespace run, newlines included, to one space
//! 3. Drop a leading `Caption:` / `Description:` label
//! 4. Strip one layer of matching surrounding quotes
//! 5. Trim

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw captioner output.
///
/// An empty return value means the model produced nothing usable.
pub fn clean_caption(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = collapse_whitespace(&s);
    let s = strip_label(&s);
    let s = strip_quotes(&s);
    s.trim().to_string()
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 2: Collapse whitespace ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").to_string()
}

// ── Rule 3: Strip leading label ──────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:image\s+)?(?:caption|description)\s*:\s*").unwrap());

fn strip_label(input: &str) -> String {
    RE_LABEL.replace(input, "").to_string()
}

// ── Rule 4: Strip surrounding quotes ─────────────────────────────────────────

fn strip_quotes(input: &str) -> String {
    let s = input.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}')] {
        if let Some(inner) = s
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.to_string();
        }
    }
    s.to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_caption_unchanged() {
        assert_eq!(clean_caption("a cat sitting on a couch"), "a cat sitting on a couch");
    }

    #[test]
    fn test_collapse_newlines() {
        assert_eq!(
            clean_caption("a dog\n\nrunning   on\r\nthe beach\n"),
            "a dog running on the beach"
        );
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(clean_caption("Caption: a red bicycle"), "a red bicycle");
        assert_eq!(clean_caption("image description:  a tree"), "a tree");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(clean_caption("\"a lighthouse at dusk\""), "a lighthouse at dusk");
        assert_eq!(clean_caption("\u{201C}a boat\u{201D}"), "a boat");
        // Unbalanced quotes are kept.
        assert_eq!(clean_caption("\"a boat"), "\"a boat");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(clean_caption("a\u{200B} cat\u{FEFF}"), "a cat");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert_eq!(clean_caption("  \n\t "), "");
        assert_eq!(clean_caption("Caption: \"\""), "");
    }
}
