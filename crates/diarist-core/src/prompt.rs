//! Instruction text sent to the model when a session closes.
//!
//! Everything except the numbered entry list is constant. The literal section
//! markers requested here are the ones [`crate::parse`] splits on.

use std::fmt::Write;

use crate::error::{DiaristError, Result};

/// Delimiter that opens every section marker.
pub const SECTION_DELIMITER: &str = "=== ";

pub const DIARY_SECTION: &str = "Full Diary";
pub const SUMMARY_SECTION: &str = "Five-Point Summary";
pub const INSIGHTS_SECTION: &str = "Insights & Suggestions";

const DIARY_ASSISTANT_RULES: &str = "\
You are my long-term diary assistant. Follow these rules strictly:

1. Role
   - You organize my diary. You are a content organizer, nothing more.
   - Your job is to arrange and summarize what I wrote today.

2. Content
   - Work only from the raw records I provide.
   - Do not add, remove or alter any fact. Do not leave any record out.
   - Keep the content objective and true to what I wrote.

3. Output
   - Exactly three sections: Full Diary, Five-Point Summary, Insights & Suggestions.

4. Forbidden
   - Never invent events, actions or feelings I did not mention.
   - Never give a psychological diagnosis.
   - Never use formulaic platitudes or canned motivational phrases.
";

/// The full line the model must reproduce for a section, e.g. `=== Full Diary ===`.
pub fn section_marker(name: &str) -> String {
    format!("{SECTION_DELIMITER}{name} ===")
}

/// The constant rule preamble, without the day's entries.
pub fn rules() -> &'static str {
    DIARY_ASSISTANT_RULES
}

/// Render the prompt for the given entries, oldest first.
pub fn build<S: AsRef<str>>(entries: &[S]) -> Result<String> {
    if entries.is_empty() {
        return Err(DiaristError::InvalidInput(
            "cannot build a diary prompt without entries".into(),
        ));
    }

    let mut prompt = String::with_capacity(DIARY_ASSISTANT_RULES.len() + 1600);
    prompt.push_str(DIARY_ASSISTANT_RULES);
    prompt.push('\n');

    prompt.push_str("Here are all of my raw records for today, in chronological order:\n");
    for (i, entry) in entries.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = writeln!(prompt, "{}. {}", i + 1, single_line(entry.as_ref()));
    }

    prompt.push_str("\nNow, following the rules, produce:\n");
    let _ = writeln!(prompt, "1) {DIARY_SECTION}");
    let _ = writeln!(prompt, "2) {SUMMARY_SECTION}");
    let _ = writeln!(prompt, "3) {INSIGHTS_SECTION}");

    prompt.push_str("\nUse exactly this format and add nothing else:\n");
    let _ = writeln!(prompt, "{}", section_marker(DIARY_SECTION));
    prompt.push_str(
        "[Merge all of today's records into one well-structured, natural diary entry. \
         Do not add facts, actions or feelings I did not mention. Do not embellish or \
         play down what I felt. Keep the first person and my own tone.]\n\n",
    );
    let _ = writeln!(prompt, "{}", section_marker(SUMMARY_SECTION));
    prompt.push_str("1. [What happened today / my overall state]\n");
    prompt.push_str("2. [Today's inspirations or important thoughts]\n");
    prompt.push_str("3. [Positive wishes I expressed]\n");
    prompt.push_str("4. [Things worth being grateful for today]\n");
    prompt.push_str("5. [Unfinished or implied to-dos]\n\n");
    let _ = writeln!(prompt, "{}", section_marker(INSIGHTS_SECTION));
    prompt.push_str(
        "[Reflect on emotional patterns, tendencies, inner needs or hidden pressure \
         in a warm mentor's voice. Offer gentle, concrete suggestions without \
         lecturing, labelling or diagnosing.]\n\n",
    );
    prompt.push_str(
        "Important: separate the sections with a blank line, do not repeat any \
         header, and follow the format exactly.",
    );

    Ok(prompt)
}

/// Fold an entry's line breaks into spaces so it occupies one list line.
fn single_line(entry: &str) -> String {
    entry
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
