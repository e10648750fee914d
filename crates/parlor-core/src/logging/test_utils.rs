//! In-memory capture of tracing events for test assertions.
//!
//! [`capture_logs`] installs a thread-local subscriber and returns a
//! [`CapturedLogs`] handle. Because the subscriber is thread-local, tests
//! using it should run on a current-thread runtime (the `#[tokio::test]`
//! default).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// A captured tracing event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Emitting module path.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Structured fields as `(name, rendered value)`.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Rendered value of a structured field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared handle to captured events and span names.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    spans: Arc<Mutex<Vec<String>>>,
}

impl CapturedLogs {
    fn lock_events(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_spans(&self) -> MutexGuard<'_, Vec<String>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All captured events, oldest first.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock_events().clone()
    }

    /// Whether any event at `level` contains `needle` in its message.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.lock_events()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    /// Whether any event at any level contains `needle` in its message.
    pub fn has_message(&self, needle: &str) -> bool {
        self.lock_events().iter().any(|e| e.message.contains(needle))
    }

    /// Whether a span named `name` was created.
    pub fn has_span(&self, name: &str) -> bool {
        self.lock_spans().iter().any(|s| s == name)
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.lock_events().iter().filter(|e| e.level == level).count()
    }

    /// Events whose target starts with `prefix`.
    pub fn events_for_target(&self, prefix: &str) -> Vec<CapturedEvent> {
        self.lock_events()
            .iter()
            .filter(|e| e.target.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.lock_events().clear();
        self.lock_spans().clear();
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_owned(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        self.logs.lock_events().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }

    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: Context<'_, S>,
    ) {
        self.logs
            .lock_spans()
            .push(attrs.metadata().name().to_owned());
    }
}

/// Install a thread-local capturing subscriber.
///
/// Keep the returned guard alive for as long as events should be captured.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry()
        .with(CaptureLayer { logs: logs.clone() })
        .with(LevelFilter::TRACE);
    (logs, subscriber.set_default())
}
