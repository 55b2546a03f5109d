//! Recover the three reflection sections from the model's free-text reply.
//!
//! The model is asked to emit literal `=== Section ===` markers (see
//! [`crate::prompt`]) but nothing forces it to. [`parse`] first slices the
//! reply between those marker lines and falls back to a keyword-driven line
//! scan when any of them is missing. Neither pass can fail.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Reflection;
use crate::prompt::{DIARY_SECTION, INSIGHTS_SECTION, SECTION_DELIMITER, SUMMARY_SECTION};

/// Stand-in for any section that could not be located or came back empty.
pub const NO_CONTENT_PLACEHOLDER: &str = "(no content)";

/// Substrings that switch the heuristic scan to a section. Matched
/// case-sensitively anywhere in the line so paraphrased headers still count.
const DIARY_KEYWORD: &str = "Full Diary";
const SUMMARY_KEYWORD: &str = "Summary";
const INSIGHTS_KEYWORD: &str = "Insights";

/// Lines made only of separator punctuation, e.g. `=====` or `---`.
static DELIMITER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s=\-*#_~]+$").unwrap());

const MARKER_ORDER: [&str; 3] = [DIARY_SECTION, SUMMARY_SECTION, INSIGHTS_SECTION];

/// A whole line holding one of the section markers. Trailing spaces and a
/// `\r` are tolerated; anything else on the line disqualifies it.
static MARKER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = MARKER_ORDER.map(regex::escape).join("|");
    let pattern = format!(
        r"(?m)^[ \t]*{}({names}) ===[ \t\r]*$",
        regex::escape(SECTION_DELIMITER)
    );
    Regex::new(&pattern).unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Diary,
    Summary,
    Insights,
}

impl Section {
    fn detect(line: &str) -> Option<Self> {
        if line.contains(DIARY_KEYWORD) {
            Some(Self::Diary)
        } else if line.contains(SUMMARY_KEYWORD) {
            Some(Self::Summary)
        } else if line.contains(INSIGHTS_KEYWORD) {
            Some(Self::Insights)
        } else {
            None
        }
    }
}

/// Parse a model reply into sections, strict pass first.
pub fn parse(raw: &str) -> Reflection {
    match parse_strict(raw) {
        Some(reflection) => reflection,
        None => {
            tracing::debug!("reply lacks literal section markers, using heuristic parse");
            parse_heuristic(raw)
        }
    }
}

/// Slice the reply between the three literal marker lines, in order.
/// Returns `None` when any of them is missing.
pub fn parse_strict(raw: &str) -> Option<Reflection> {
    let mut bounds: Vec<(usize, usize)> = Vec::with_capacity(MARKER_ORDER.len());
    for caps in MARKER_LINE_RE.captures_iter(raw) {
        let Some(expected) = MARKER_ORDER.get(bounds.len()) else {
            break;
        };
        if &caps[1] == *expected {
            let line = caps.get(0)?;
            bounds.push((line.start(), line.end()));
        }
    }
    if bounds.len() < MARKER_ORDER.len() {
        return None;
    }

    let body = |i: usize| {
        let end = bounds.get(i + 1).map_or(raw.len(), |next| next.0);
        or_placeholder(&raw[bounds[i].1..end])
    };
    Some(Reflection {
        diary: body(0),
        summary: body(1),
        insights: body(2),
    })
}

/// Line-by-line classification driven by section keywords.
pub fn parse_heuristic(raw: &str) -> Reflection {
    let mut diary = String::new();
    let mut summary = String::new();
    let mut insights = String::new();
    let mut current = Section::Diary;

    for line in raw.lines() {
        if let Some(section) = Section::detect(line) {
            current = section;
            continue;
        }
        if line.trim().is_empty() || DELIMITER_LINE_RE.is_match(line) {
            continue;
        }

        let buf = match current {
            Section::Diary => &mut diary,
            Section::Summary => &mut summary,
            Section::Insights => &mut insights,
        };
        buf.push_str(line);
        buf.push('\n');
    }

    Reflection {
        diary: or_placeholder(diary),
        summary: or_placeholder(summary),
        insights: or_placeholder(insights),
    }
}

fn or_placeholder(text: impl AsRef<str>) -> String {
    let trimmed = text.as_ref().trim();
    if trimmed.is_empty() {
        NO_CONTENT_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}
