//! Deterministic rewrite of a message list given selected injections.
//!
//! Within every position group, contents are ordered by descending
//! priority (stable for ties) and joined with the configured separator.
//!
//! | Position | Effect |
//! |---|---|
//! | `BEFORE_SYSTEM_PROMPT` | prepended to the first system message |
//! | `AFTER_SYSTEM_PROMPT` | appended to the first system message |
//! | `TOP_OF_CHAT` | one tagged message before the first non-system message |
//! | `BOTTOM_OF_CHAT` | one tagged message before the last message |
//! | `AT_DEPTH` | one tagged message per resolved index `max(0, n - depth)` |
//!
//! With no system message, a new one holding only the injected system text
//! is placed first. Every chat-position index is resolved against the
//! original list before anything is inserted, so insertions never shift one
//! another. When several insertions share an index they appear in the order
//! top, depth, bottom.

use std::borrow::Cow;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use parlor_core::messages::{Message, MessagePart, MessageRole};
use parlor_settings::ContextSettings;

use crate::collector::InjectionsByPosition;
use crate::injection::{InjectionPosition, PromptInjection};

/// Formatting of injected content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Tag wrapped around non-system injected messages.
    pub tag: String,
    /// Joiner for merged contents.
    pub separator: String,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self::from(&ContextSettings::default())
    }
}

impl From<&ContextSettings> for ApplyOptions {
    fn from(settings: &ContextSettings) -> Self {
        Self {
            tag: settings.injection_tag.clone(),
            separator: settings.separator.clone(),
        }
    }
}

impl ApplyOptions {
    fn wrap(&self, content: &str) -> Message {
        let tag = &self.tag;
        Message::user(format!("<{tag}>\n{content}\n</{tag}>"))
    }
}

/// Rewrite `messages` with the injections in `by_position`.
///
/// Returns the input slice itself when there is nothing to inject; the
/// input is never modified.
#[must_use]
pub fn apply_injections<'a>(
    messages: &'a [Message],
    by_position: &InjectionsByPosition,
    options: &ApplyOptions,
) -> Cow<'a, [Message]> {
    let ordered = by_priority(by_position);
    if ordered.is_empty() {
        return Cow::Borrowed(messages);
    }

    let n = messages.len();
    let mut before = None;
    let mut after = None;
    let mut inserts: BTreeMap<usize, Vec<Message>> = BTreeMap::new();

    // Chat insertions are pushed in top, depth, bottom order so that ties at
    // one index keep that order.
    for position in [
        InjectionPosition::BeforeSystemPrompt,
        InjectionPosition::AfterSystemPrompt,
        InjectionPosition::TopOfChat,
        InjectionPosition::AtDepth,
        InjectionPosition::BottomOfChat,
    ] {
        let Some(group) = ordered.get(&position) else {
            continue;
        };
        match position {
            InjectionPosition::BeforeSystemPrompt => before = Some(join(group, options)),
            InjectionPosition::AfterSystemPrompt => after = Some(join(group, options)),
            InjectionPosition::TopOfChat => {
                let index = messages
                    .iter()
                    .position(|m| m.role != MessageRole::System)
                    .unwrap_or(n);
                inserts
                    .entry(index)
                    .or_default()
                    .push(options.wrap(&join(group, options)));
            }
            InjectionPosition::AtDepth => {
                let mut by_index: BTreeMap<usize, Vec<&PromptInjection>> = BTreeMap::new();
                for injection in group {
                    let depth = injection.inject_depth().unwrap_or(0);
                    by_index
                        .entry(n.saturating_sub(depth))
                        .or_default()
                        .push(injection);
                }
                for (index, merged) in by_index {
                    inserts
                        .entry(index)
                        .or_default()
                        .push(options.wrap(&join(&merged, options)));
                }
            }
            InjectionPosition::BottomOfChat => {
                inserts
                    .entry(n.saturating_sub(1))
                    .or_default()
                    .push(options.wrap(&join(group, options)));
            }
        }
    }

    let system_index = messages.iter().position(|m| m.role == MessageRole::System);
    let mut out = Vec::with_capacity(n + inserts.len() + 1);

    if system_index.is_none() && (before.is_some() || after.is_some()) {
        let text = [before.as_deref(), after.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(&options.separator);
        out.push(Message::system(text));
    }

    for (i, message) in messages.iter().enumerate() {
        if let Some(pending) = inserts.remove(&i) {
            out.extend(pending);
        }
        if Some(i) == system_index {
            out.push(edit_system(
                message,
                before.as_deref(),
                after.as_deref(),
                &options.separator,
            ));
        } else {
            out.push(message.clone());
        }
    }
    if let Some(pending) = inserts.remove(&n) {
        out.extend(pending);
    }

    Cow::Owned(out)
}

/// Non-empty groups, each sorted by descending priority.
fn by_priority(by_position: &InjectionsByPosition) -> BTreeMap<InjectionPosition, Vec<&PromptInjection>> {
    by_position
        .iter()
        .filter(|(_, group)| !group.is_empty())
        .map(|(position, group)| {
            let mut sorted: Vec<&PromptInjection> = group.iter().collect();
            sorted.sort_by_key(|i| Reverse(i.priority()));
            (*position, sorted)
        })
        .collect()
}

fn join(group: &[&PromptInjection], options: &ApplyOptions) -> String {
    group
        .iter()
        .map(|i| i.content())
        .collect::<Vec<_>>()
        .join(&options.separator)
}

fn edit_system(message: &Message, before: Option<&str>, after: Option<&str>, sep: &str) -> Message {
    let mut edited = message.clone();
    if before.is_none() && after.is_none() {
        return edited;
    }
    let mut parts = Vec::with_capacity(edited.parts.len() + 2);
    if let Some(text) = before {
        parts.push(MessagePart::text(format!("{text}{sep}")));
    }
    parts.append(&mut edited.parts);
    if let Some(text) = after {
        parts.push(MessagePart::text(format!("{sep}{text}")));
    }
    edited.parts = parts;
    edited
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
