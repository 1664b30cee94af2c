//! Cleanup of extracted text before chunking.

use serde::{Deserialize, Serialize};

/// Minimum whitespace run length that gets collapsed.
const WHITESPACE_RUN: usize = 5;

/// Replacement for a collapsed whitespace run.
const COLLAPSED: &str = " \n";

/// Per-source normalization settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Replace ligature code points and the `Ɵ` glyph PDF extraction emits
    /// for the "ti" ligature.
    #[serde(default)]
    pub repair_glyphs: bool,

    /// Keep only ASCII letters and whitespace.
    #[serde(default)]
    pub letters_only: bool,
}

impl NormalizeOptions {
    /// Profile for text coming out of PDF extraction.
    pub fn pdf() -> Self {
        Self {
            repair_glyphs: true,
            letters_only: false,
        }
    }

    /// Profile for text scraped from web pages.
    pub fn website() -> Self {
        Self::default()
    }
}

/// Normalize raw extracted text.
///
/// Runs glyph repair, then character filtering, then whitespace collapse.
/// The result is a fixed point: normalizing it again returns it unchanged.
pub fn normalize(raw: &str, options: &NormalizeOptions) -> String {
    let mut filtered = String::with_capacity(raw.len());

    for c in raw.chars() {
        if options.repair_glyphs {
            if let Some(replacement) = repair_glyph(c) {
                filtered.push_str(replacement);
                continue;
            }
        }

        if is_non_printable(c) {
            continue;
        }

        if options.letters_only && !(c.is_ascii_alphabetic() || c.is_whitespace()) {
            continue;
        }

        filtered.push(c);
    }

    collapse_whitespace(&filtered)
}

fn repair_glyph(c: char) -> Option<&'static str> {
    match c {
        '\u{FB00}' => Some("ff"),
        '\u{FB01}' => Some("fi"),
        '\u{FB02}' => Some("fl"),
        '\u{FB03}' => Some("ffi"),
        '\u{FB04}' => Some("ffl"),
        '\u{FB05}' | '\u{FB06}' => Some("st"),
        '\u{019F}' => Some("ti"),
        _ => None,
    }
}

/// Control or format characters that are not whitespace.
fn is_non_printable(c: char) -> bool {
    if c.is_whitespace() {
        return false;
    }
    c.is_control() || is_format(c)
}

// Unicode general category Cf
fn is_format(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    let mut run_len = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            run.push(c);
            run_len += 1;
            continue;
        }
        flush_run(&mut out, &mut run, &mut run_len);
        out.push(c);
    }
    flush_run(&mut out, &mut run, &mut run_len);

    out
}

fn flush_run(out: &mut String, run: &mut String, run_len: &mut usize) {
    if *run_len >= WHITESPACE_RUN {
        out.push_str(COLLAPSED);
    } else {
        out.push_str(run);
    }
    run.clear();
    *run_len = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_long_whitespace_runs() {
        let text = "first\n\n\n\n\n\nsecond   third";
        let result = normalize(text, &NormalizeOptions::default());
        assert_eq!(result, "first \nsecond   third");
    }

    #[test]
    fn test_short_runs_are_kept() {
        let text = "a \t \nb";
        assert_eq!(normalize(text, &NormalizeOptions::default()), text);
    }

    #[test]
    fn test_strips_non_printable() {
        let text = "zero\u{200B}width\u{0000} bom\u{FEFF}\u{0007}";
        assert_eq!(
            normalize(text, &NormalizeOptions::default()),
            "zerowidth bom"
        );
    }

    #[test]
    fn test_pdf_profile_repairs_glyphs() {
        let text = "e\u{FB03}cient \u{FB01}le na\u{019F}on";
        assert_eq!(
            normalize(text, &NormalizeOptions::pdf()),
            "efficient file nation"
        );
    }

    #[test]
    fn test_website_profile_leaves_glyphs() {
        let text = "\u{FB01}le";
        assert_eq!(normalize(text, &NormalizeOptions::website()), text);
    }

    #[test]
    fn test_letters_only() {
        let options = NormalizeOptions {
            letters_only: true,
            ..Default::default()
        };
        assert_eq!(normalize("It's 42 degrees!", &options), "Its  degrees");
    }

    #[test]
    fn test_removed_characters_join_whitespace_runs() {
        let text = "a  \u{200B}   b";
        assert_eq!(normalize(text, &NormalizeOptions::default()), "a \nb");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "plain text",
            "  lead\n\n\n\n\n\n\n\ntrail      ",
            "na\u{019F}on\u{00AD}al \u{FB02}ow\t\t\t\t\t\u{200B}\t\tend",
            "mixed 12 !! \r\n\r\n\r\n text",
        ];
        let profiles = [
            NormalizeOptions::default(),
            NormalizeOptions::pdf(),
            NormalizeOptions {
                repair_glyphs: true,
                letters_only: true,
            },
        ];

        for options in &profiles {
            for sample in &samples {
                let once = normalize(sample, options);
                let twice = normalize(&once, options);
                assert_eq!(once, twice, "not idempotent for {:?}", sample);
            }
        }
    }
}
