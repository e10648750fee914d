//! Selection of the injections that apply to one request.
//!
//! A mode injection is selected when it is enabled and linked to the
//! assistant. A lorebook entry is selected when its lorebook is enabled and
//! linked, the entry itself is enabled, and the entry triggers against the
//! message history.

use std::collections::BTreeMap;

use parlor_core::messages::Message;
use tracing::debug;

use crate::injection::{Assistant, InjectionPosition, Lorebook, ModeInjection, PromptInjection};
use crate::lorebook_matcher::is_triggered;

/// Selected injections keyed by position, each list in selection order.
pub type InjectionsByPosition = BTreeMap<InjectionPosition, Vec<PromptInjection>>;

/// Select the injections that apply to `messages` for `assistant`.
///
/// Pure; output order carries no meaning.
#[must_use]
pub fn collect_injections(
    messages: &[Message],
    assistant: &Assistant,
    mode_injections: &[ModeInjection],
    lorebooks: &[Lorebook],
) -> Vec<PromptInjection> {
    let modes = mode_injections
        .iter()
        .filter(|m| m.enabled && assistant.links_mode(&m.id))
        .cloned()
        .map(PromptInjection::Mode);

    let entries = lorebooks
        .iter()
        .filter(|book| book.enabled && assistant.links_lorebook(&book.id))
        .flat_map(|book| book.entries.iter())
        .filter(|entry| entry.enabled && is_triggered(entry, messages))
        .cloned()
        .map(PromptInjection::Lorebook);

    let selected: Vec<PromptInjection> = modes.chain(entries).collect();
    debug!(
        assistant_id = %assistant.id,
        selected = selected.len(),
        "collected prompt injections"
    );
    selected
}

/// Group injections by position, preserving relative order within each group.
#[must_use]
pub fn group_by_position(injections: Vec<PromptInjection>) -> InjectionsByPosition {
    let mut grouped = InjectionsByPosition::new();
    for injection in injections {
        grouped
            .entry(injection.position())
            .or_default()
            .push(injection);
    }
    grouped
}
