//! Markdown rendering of the project library.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::LibraryEntry;

/// Longest prompt shown in the table before truncation.
const MAX_PROMPT_DISPLAY_LENGTH: usize = 80;

/// Renders the saved-project library as a Markdown table.
///
/// Entries are listed in the order given, which callers keep most-recent-first.
pub struct LibraryMarkdown<'a> {
    entries: &'a [LibraryEntry],
}

impl<'a> LibraryMarkdown<'a> {
    /// Creates a generator over `entries`.
    #[must_use]
    pub const fn new(entries: &'a [LibraryEntry]) -> Self {
        Self { entries }
    }

    /// Generates the Markdown document.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "# Project Library\n");

        if self.entries.is_empty() {
            let _ = writeln!(output, "*No saved projects yet.*");
            return output;
        }

        let count = self.entries.len();
        let noun = if count == 1 { "project" } else { "projects" };
        let _ = writeln!(output, "{count} saved {noun}, most recent first.\n");

        let _ = writeln!(output, "| # | Title | Prompt | Updated | ID |");
        let _ = writeln!(output, "|---|-------|--------|---------|----|");
        for (index, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | `{}` |",
                index + 1,
                escape_markdown(&entry.title),
                escape_markdown(&truncate(&entry.prompt, MAX_PROMPT_DISPLAY_LENGTH)),
                format_timestamp(&entry.timestamp),
                entry.id
            );
        }
        output
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Makes text safe for a table cell.
fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_generate_table() {
        let entries = vec![
            LibraryEntry::new("b", "Dark | Portfolio", "d", "Refinement Request: make it dark", at(12, 0)),
            LibraryEntry::new("a", "Portfolio", "d", "a portfolio site", at(10, 30)),
        ];

        insta::assert_snapshot!(LibraryMarkdown::new(&entries).generate(), @r"
# Project Library

2 saved projects, most recent first.

| # | Title | Prompt | Updated | ID |
|---|-------|--------|---------|----|
| 1 | Dark \| Portfolio | Refinement Request: make it dark | 2026-01-01 12:00 UTC | `b` |
| 2 | Portfolio | a portfolio site | 2026-01-01 10:30 UTC | `a` |
");
    }

    #[test]
    fn test_generate_empty() {
        let markdown = LibraryMarkdown::new(&[]).generate();
        assert!(markdown.contains("*No saved projects yet.*"));
        assert!(!markdown.contains("| # |"));
    }

    #[test]
    fn test_single_entry_wording() {
        let entries = vec![LibraryEntry::new("a", "A", "d", "p", at(9, 5))];
        assert!(LibraryMarkdown::new(&entries)
            .generate()
            .contains("1 saved project, most recent first."));
    }

    #[test]
    fn test_long_prompt_truncated() {
        let prompt = "x".repeat(100);
        let entries = vec![LibraryEntry::new("a", "A", "d", prompt, at(9, 5))];
        let markdown = LibraryMarkdown::new(&entries).generate();
        assert!(markdown.contains(&format!("{}...", "x".repeat(80))));
        assert!(!markdown.contains(&"x".repeat(81)));
    }

    #[test]
    fn test_escape_markdown_newlines() {
        assert_eq!(escape_markdown("a\nb|c"), "a b\\|c");
    }
}
