//! Keyword and regex trigger evaluation for lorebook entries.
//!
//! ## Matching semantics
//!
//! - `constant_active` entries always trigger.
//! - Otherwise the text of the last `scan_depth` messages (messages, not
//!   nodes, counted from the end) is joined with newlines into a scan buffer.
//! - Each keyword is tested as a regex (`use_regex`) or as a substring, with
//!   case folding unless `case_sensitive` is set. Any match triggers.
//! - Blank keywords and patterns that fail to compile never match; the
//!   failure is logged and the remaining keywords are still tried.

use parlor_core::messages::Message;
use regex::RegexBuilder;
use tracing::warn;

use crate::injection::LorebookEntry;

/// Joined text of the last `scan_depth` messages.
#[must_use]
pub fn scan_buffer(messages: &[Message], scan_depth: usize) -> String {
    let start = messages.len().saturating_sub(scan_depth);
    messages[start..]
        .iter()
        .map(Message::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether `entry` triggers against `messages`.
///
/// Only the entry's own fields are consulted; lorebook and assistant level
/// gating happens in the collector.
#[must_use]
pub fn is_triggered(entry: &LorebookEntry, messages: &[Message]) -> bool {
    if entry.constant_active {
        return true;
    }
    if entry.keywords.is_empty() || entry.scan_depth == 0 {
        return false;
    }
    let buffer = scan_buffer(messages, entry.scan_depth);
    if buffer.is_empty() {
        return false;
    }

    if entry.use_regex {
        entry
            .keywords
            .iter()
            .any(|pattern| regex_matches(entry, pattern, &buffer))
    } else if entry.case_sensitive {
        entry
            .keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| buffer.contains(k.as_str()))
    } else {
        let folded = buffer.to_lowercase();
        entry
            .keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| folded.contains(&k.to_lowercase()))
    }
}

fn regex_matches(entry: &LorebookEntry, pattern: &str, buffer: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    match RegexBuilder::new(pattern)
        .case_insensitive(!entry.case_sensitive)
        .build()
    {
        Ok(re) => re.is_match(buffer),
        Err(e) => {
            warn!(entry_id = %entry.id, pattern, error = %e, "invalid lorebook pattern, treating as non-matching");
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
