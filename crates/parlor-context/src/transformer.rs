//! Message transformers and the context assembler.
//!
//! A [`MessageTransformer`] rewrites the outgoing message list. Transformers
//! pass a `Cow` along so that a pipeline where nothing changes hands back
//! the caller's slice untouched. [`ContextAssembler`] is the entry point
//! used by the service layer.

use std::borrow::Cow;

use parlor_core::conversation::Conversation;
use parlor_core::messages::Message;
use parlor_settings::ContextSettings;
use tracing::{debug, instrument};

use crate::applier::{ApplyOptions, apply_injections};
use crate::collector::{collect_injections, group_by_position};
use crate::injection::{Assistant, InjectionCatalog};

/// Inputs shared by every transformer in one assembly.
#[derive(Clone, Copy, Debug)]
pub struct TransformContext<'a> {
    /// Active assistant.
    pub assistant: &'a Assistant,
    /// Injection definitions supplied with the request.
    pub catalog: &'a InjectionCatalog,
}

/// A rewrite step applied to the outgoing message list.
pub trait MessageTransformer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Rewrite `messages`, returning them unchanged when there is nothing to do.
    fn transform<'a>(
        &self,
        ctx: &TransformContext<'_>,
        messages: Cow<'a, [Message]>,
    ) -> Cow<'a, [Message]>;
}

/// Mode injections and lorebook entries.
#[derive(Clone, Debug, Default)]
pub struct PromptInjectionTransformer {
    options: ApplyOptions,
}

impl PromptInjectionTransformer {
    /// Transformer with explicit formatting options.
    #[must_use]
    pub fn new(options: ApplyOptions) -> Self {
        Self { options }
    }
}

impl MessageTransformer for PromptInjectionTransformer {
    fn name(&self) -> &'static str {
        "prompt_injection"
    }

    fn transform<'a>(
        &self,
        ctx: &TransformContext<'_>,
        messages: Cow<'a, [Message]>,
    ) -> Cow<'a, [Message]> {
        let selected = collect_injections(
            &messages,
            ctx.assistant,
            &ctx.catalog.mode_injections,
            &ctx.catalog.lorebooks,
        );
        if selected.is_empty() {
            return messages;
        }
        let grouped = group_by_position(selected);
        match messages {
            Cow::Borrowed(slice) => apply_injections(slice, &grouped, &self.options),
            Cow::Owned(vec) => {
                let rewritten = match apply_injections(&vec, &grouped, &self.options) {
                    Cow::Owned(v) => Some(v),
                    Cow::Borrowed(_) => None,
                };
                Cow::Owned(rewritten.unwrap_or(vec))
            }
        }
    }
}

/// Ordered list of transformers.
#[derive(Default)]
pub struct TransformPipeline {
    stages: Vec<Box<dyn MessageTransformer>>,
}

impl TransformPipeline {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    #[must_use]
    pub fn with(mut self, stage: impl MessageTransformer + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order.
    pub fn run<'a>(&self, ctx: &TransformContext<'_>, messages: &'a [Message]) -> Cow<'a, [Message]> {
        self.stages
            .iter()
            .fold(Cow::Borrowed(messages), |acc, stage| {
                let out = stage.transform(ctx, acc);
                debug!(stage = stage.name(), messages = out.len(), "transform stage done");
                out
            })
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

/// Produces the message list sent to the model.
#[derive(Debug)]
pub struct ContextAssembler {
    pipeline: TransformPipeline,
}

impl ContextAssembler {
    /// Assembler running prompt injection with the configured formatting.
    #[must_use]
    pub fn new(settings: &ContextSettings) -> Self {
        Self::with_pipeline(
            TransformPipeline::new().with(PromptInjectionTransformer::new(ApplyOptions::from(settings))),
        )
    }

    /// Assembler around a custom pipeline.
    #[must_use]
    pub fn with_pipeline(pipeline: TransformPipeline) -> Self {
        Self { pipeline }
    }

    /// Transformed message list for `assistant` given `catalog`.
    #[instrument(skip_all, fields(assistant_id = %assistant.id, input = messages.len()))]
    pub fn assemble<'a>(
        &self,
        messages: &'a [Message],
        assistant: &Assistant,
        catalog: &InjectionCatalog,
    ) -> Cow<'a, [Message]> {
        let ctx = TransformContext { assistant, catalog };
        self.pipeline.run(&ctx, messages)
    }

    /// Transformed context view of a conversation (from its truncation point).
    pub fn assemble_conversation(
        &self,
        conversation: &Conversation,
        assistant: &Assistant,
        catalog: &InjectionCatalog,
    ) -> Vec<Message> {
        let messages = conversation.context_messages();
        self.assemble(&messages, assistant, catalog).into_owned()
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(&ContextSettings::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
