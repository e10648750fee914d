//! Prompt injection definitions.
//!
//! Two kinds of injection share a common contract (id, enabled, priority,
//! position, content, depth):
//!
//! - [`ModeInjection`]: always applied when linked to the active assistant
//! - [`LorebookEntry`]: applied only when its keywords match recent messages
//!
//! [`PromptInjection`] is the sum of the two. Lorebook entries are grouped
//! into a [`Lorebook`]; an [`Assistant`] links to mode injections and
//! lorebooks by id.

use std::collections::HashSet;

use parlor_core::ids::{AssistantId, InjectionId, LorebookId};
use serde::{Deserialize, Serialize};

/// Where injected content lands in the outgoing message list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InjectionPosition {
    /// Prepended to the system prompt.
    BeforeSystemPrompt,
    /// Appended to the system prompt.
    #[default]
    AfterSystemPrompt,
    /// Inserted before the first non-system message.
    TopOfChat,
    /// Inserted before the last message.
    BottomOfChat,
    /// Inserted `inject_depth` messages from the end.
    AtDepth,
}

impl InjectionPosition {
    /// Positions that edit the system message rather than adding one.
    #[must_use]
    pub fn is_system(self) -> bool {
        matches!(self, Self::BeforeSystemPrompt | Self::AfterSystemPrompt)
    }
}

fn default_true() -> bool {
    true
}

fn default_inject_depth() -> usize {
    4
}

fn default_scan_depth() -> usize {
    5
}

/// Injection applied whenever the assistant links it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeInjection {
    /// Unique id.
    pub id: InjectionId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Disabled injections are never applied.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Higher priority content comes first within a position.
    #[serde(default)]
    pub priority: i32,
    /// Insertion position.
    #[serde(default)]
    pub position: InjectionPosition,
    /// Text to inject.
    pub content: String,
    /// Distance from the end, only meaningful for [`InjectionPosition::AtDepth`].
    #[serde(default = "default_inject_depth")]
    pub inject_depth: usize,
}

impl ModeInjection {
    /// Enabled injection at `position` with default priority.
    #[must_use]
    pub fn new(position: InjectionPosition, content: impl Into<String>) -> Self {
        Self {
            id: InjectionId::new(),
            name: String::new(),
            enabled: true,
            priority: 0,
            position,
            content: content.into(),
            inject_depth: default_inject_depth(),
        }
    }
}

/// Keyword or regex triggered injection belonging to a [`Lorebook`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LorebookEntry {
    /// Unique id.
    pub id: InjectionId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Disabled entries never trigger.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Higher priority content comes first within a position.
    #[serde(default)]
    pub priority: i32,
    /// Insertion position.
    #[serde(default)]
    pub position: InjectionPosition,
    /// Text to inject.
    pub content: String,
    /// Distance from the end, only meaningful for [`InjectionPosition::AtDepth`].
    #[serde(default = "default_inject_depth")]
    pub inject_depth: usize,
    /// Trigger keywords, or patterns when `use_regex` is set.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Treat keywords as regular expressions.
    #[serde(default)]
    pub use_regex: bool,
    /// Match case exactly.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Number of most recent messages scanned for triggers.
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
    /// Trigger regardless of keywords.
    #[serde(default)]
    pub constant_active: bool,
}

impl LorebookEntry {
    /// Enabled entry triggered by `keywords`, using default scan settings.
    #[must_use]
    pub fn new<I, S>(position: InjectionPosition, content: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: InjectionId::new(),
            name: String::new(),
            enabled: true,
            priority: 0,
            position,
            content: content.into(),
            inject_depth: default_inject_depth(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            use_regex: false,
            case_sensitive: false,
            scan_depth: default_scan_depth(),
            constant_active: false,
        }
    }
}

/// Either kind of injection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptInjection {
    /// Assistant-linked mode injection.
    Mode(ModeInjection),
    /// Triggered lorebook entry.
    Lorebook(LorebookEntry),
}

impl PromptInjection {
    /// Injection id.
    #[must_use]
    pub fn id(&self) -> &InjectionId {
        match self {
            Self::Mode(m) => &m.id,
            Self::Lorebook(e) => &e.id,
        }
    }

    /// Own enabled flag.
    #[must_use]
    pub fn enabled(&self) -> bool {
        match self {
            Self::Mode(m) => m.enabled,
            Self::Lorebook(e) => e.enabled,
        }
    }

    /// Ordering priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::Mode(m) => m.priority,
            Self::Lorebook(e) => e.priority,
        }
    }

    /// Insertion position.
    #[must_use]
    pub fn position(&self) -> InjectionPosition {
        match self {
            Self::Mode(m) => m.position,
            Self::Lorebook(e) => e.position,
        }
    }

    /// Injected text.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Mode(m) => &m.content,
            Self::Lorebook(e) => &e.content,
        }
    }

    /// Depth for [`InjectionPosition::AtDepth`]; `None` for every other position.
    #[must_use]
    pub fn inject_depth(&self) -> Option<usize> {
        let depth = match self {
            Self::Mode(m) => m.inject_depth,
            Self::Lorebook(e) => e.inject_depth,
        };
        (self.position() == InjectionPosition::AtDepth).then_some(depth)
    }
}

impl From<ModeInjection> for PromptInjection {
    fn from(m: ModeInjection) -> Self {
        Self::Mode(m)
    }
}

impl From<LorebookEntry> for PromptInjection {
    fn from(e: LorebookEntry) -> Self {
        Self::Lorebook(e)
    }
}

/// A named collection of lorebook entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lorebook {
    /// Unique id.
    pub id: LorebookId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// When disabled none of the entries trigger.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Entries in definition order.
    #[serde(default)]
    pub entries: Vec<LorebookEntry>,
}

impl Lorebook {
    /// Enabled lorebook holding `entries`.
    #[must_use]
    pub fn new(entries: Vec<LorebookEntry>) -> Self {
        Self {
            id: LorebookId::new(),
            name: String::new(),
            enabled: true,
            entries,
        }
    }
}

/// The assistant persona's links to injection definitions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    /// Assistant id.
    pub id: AssistantId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Linked mode injections.
    #[serde(default)]
    pub mode_injection_ids: HashSet<InjectionId>,
    /// Linked lorebooks.
    #[serde(default)]
    pub lorebook_ids: HashSet<LorebookId>,
}

impl Assistant {
    /// Whether the assistant links this mode injection.
    #[must_use]
    pub fn links_mode(&self, id: &InjectionId) -> bool {
        self.mode_injection_ids.contains(id)
    }

    /// Whether the assistant links this lorebook.
    #[must_use]
    pub fn links_lorebook(&self, id: &LorebookId) -> bool {
        self.lorebook_ids.contains(id)
    }
}

/// Every injection definition available to a transform call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionCatalog {
    /// All mode injections.
    #[serde(default)]
    pub mode_injections: Vec<ModeInjection>,
    /// All lorebooks.
    #[serde(default)]
    pub lorebooks: Vec<Lorebook>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn depth_only_for_at_depth() {
        let mut m = ModeInjection::new(InjectionPosition::TopOfChat, "x");
        m.inject_depth = 3;
        assert_eq!(PromptInjection::from(m.clone()).inject_depth(), None);
        m.position = InjectionPosition::AtDepth;
        assert_eq!(PromptInjection::from(m).inject_depth(), Some(3));
    }

    #[test]
    fn system_positions() {
        assert!(InjectionPosition::BeforeSystemPrompt.is_system());
        assert!(InjectionPosition::AfterSystemPrompt.is_system());
        assert!(!InjectionPosition::AtDepth.is_system());
    }

    #[test]
    fn entry_defaults_from_json() {
        let entry: LorebookEntry = serde_json::from_value(json!({
            "id": "e1",
            "content": "dragons are real",
            "keywords": ["dragon"]
        }))
        .unwrap();
        assert!(entry.enabled);
        assert_eq!(entry.priority, 0);
        assert_eq!(entry.position, InjectionPosition::AfterSystemPrompt);
        assert_eq!(entry.scan_depth, 5);
        assert!(!entry.case_sensitive);
        assert!(!entry.constant_active);
    }

    #[test]
    fn position_wire_names() {
        assert_eq!(
            serde_json::to_value(InjectionPosition::BeforeSystemPrompt).unwrap(),
            json!("BEFORE_SYSTEM_PROMPT")
        );
        let p: InjectionPosition = serde_json::from_value(json!("AT_DEPTH")).unwrap();
        assert_eq!(p, InjectionPosition::AtDepth);
    }

    #[test]
    fn common_accessors_dispatch() {
        let mut entry = LorebookEntry::new(InjectionPosition::BottomOfChat, "lore", ["k"]);
        entry.priority = 7;
        let inj = PromptInjection::from(entry.clone());
        assert_eq!(inj.id(), &entry.id);
        assert_eq!(inj.priority(), 7);
        assert_eq!(inj.content(), "lore");
        assert_eq!(inj.position(), InjectionPosition::BottomOfChat);
        assert!(inj.enabled());
    }

    #[test]
    fn tagged_union_picks_variant_by_kind() {
        let inj: PromptInjection = serde_json::from_value(json!({
            "kind": "lorebook",
            "id": "e1",
            "content": "lore",
            "keywords": ["dragon"]
        }))
        .unwrap();
        assert_matches!(inj, PromptInjection::Lorebook(LorebookEntry { ref keywords, .. }) if keywords == &["dragon"]);

        let mode = PromptInjection::from(ModeInjection::new(InjectionPosition::AtDepth, "x"));
        let v = serde_json::to_value(&mode).unwrap();
        assert_eq!(v["kind"], "mode");
        assert_matches!(serde_json::from_value(v).unwrap(), PromptInjection::Mode(ModeInjection { position: InjectionPosition::AtDepth, .. }));
    }

    #[test]
    fn catalog_deserializes_camel_case() {
        let catalog: InjectionCatalog = serde_json::from_value(json!({
            "modeInjections": [{"id": "m1", "content": "be terse", "position": "TOP_OF_CHAT"}],
            "lorebooks": [{"id": "l1", "entries": []}]
        }))
        .unwrap();
        assert_eq!(catalog.mode_injections[0].position, InjectionPosition::TopOfChat);
        assert!(catalog.lorebooks[0].enabled);
    }
}
