//! # parlor-context
//!
//! Prompt injection for outgoing model requests.
//!
//! - **Injection model**: mode injections, lorebooks and their entries, assistant links
//! - **Lorebook matcher**: keyword / regex triggers over a per-entry scan window
//! - **Collector**: selects enabled, linked, triggered injections
//! - **Applier**: rewrites the message list per injection position
//! - **Transformers**: pluggable rewrite pipeline and the [`ContextAssembler`]

#![deny(unsafe_code)]

pub mod applier;
pub mod collector;
pub mod injection;
pub mod lorebook_matcher;
pub mod transformer;

pub use applier::{ApplyOptions, apply_injections};
pub use collector::{InjectionsByPosition, collect_injections, group_by_position};
pub use injection::{
    Assistant, InjectionCatalog, InjectionPosition, Lorebook, LorebookEntry, ModeInjection,
    PromptInjection,
};
pub use transformer::{
    ContextAssembler, MessageTransformer, PromptInjectionTransformer, TransformContext,
    TransformPipeline,
};
