//! Logging setup for the simalg crates.
//!
//! The library crates only talk to the `log` facade. [`init_logging`] routes
//! those records into `tracing`, filters them with `RUST_LOG` (or
//! `SIMALG_LOG`) and hands each surviving event to an optional process-wide
//! hook as a [`LogRecord`].

use chrono::{SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_log::LogTracer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Fallback filter variable, read when `RUST_LOG` is unset or invalid
pub const ENV_FILTER: &str = "SIMALG_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub ts: String,
    pub level: String,
    pub target: String,
    pub message: String,
    /// Enclosing span names, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, JsonValue>,
}

type LogHook = Arc<dyn Fn(&LogRecord) + Send + Sync + 'static>;

static LOG_HOOK: OnceCell<LogHook> = OnceCell::new();

/// Keeps a thread-local subscriber alive when a global one was already set.
pub struct LoggingGuard {
    _guard: Option<DefaultGuard>,
}

impl LoggingGuard {
    /// True when this call installed the process-wide subscriber.
    pub fn is_global(&self) -> bool {
        self._guard.is_none()
    }
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("global", &self.is_global())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Used instead of the environment when set
    pub filter: Option<String>,
    /// Also print events to stderr
    pub stderr: bool,
}

/// Install the hook that receives every record. Only the first call wins;
/// later calls return `false`.
pub fn set_log_hook<F>(hook: F) -> bool
where
    F: Fn(&LogRecord) + Send + Sync + 'static,
{
    LOG_HOOK.set(Arc::new(hook)).is_ok()
}

pub fn init_logging(opts: LoggingOptions) -> LoggingGuard {
    // log:: macros from the library crates flow into tracing
    let _ = LogTracer::init();

    let build_subscriber = || {
        let stderr = opts
            .stderr
            .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
        tracing_subscriber::registry()
            .with(env_filter(opts.filter.as_deref()))
            .with(RecordLayer)
            .with(stderr)
    };

    let guard = match tracing::subscriber::set_global_default(build_subscriber()) {
        Ok(()) => None,
        Err(_) => Some(tracing::subscriber::set_default(build_subscriber())),
    };
    LoggingGuard { _guard: guard }
}

fn env_filter(explicit: Option<&str>) -> EnvFilter {
    if let Some(filter) = explicit.and_then(|f| EnvFilter::try_new(f).ok()) {
        return filter;
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(ENV_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct RecordLayer;

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(hook) = LOG_HOOK.get() else {
            return;
        };
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        // Events bridged from `log` carry their origin in `log.*` fields
        let meta = event.metadata();
        let target = visitor
            .log_target
            .take()
            .unwrap_or_else(|| meta.target().to_string());
        let spans = ctx
            .event_scope(event)
            .map(|scope| scope.from_root().map(|span| span.name().to_string()).collect())
            .unwrap_or_default();

        let record = LogRecord {
            ts: now_rfc3339(),
            level: meta.level().to_string(),
            target,
            message: visitor.message.unwrap_or_default(),
            spans,
            fields: visitor.fields,
        };
        hook(&record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    log_target: Option<String>,
    fields: Map<String, JsonValue>,
}

impl RecordVisitor {
    fn put(&mut self, field: &Field, value: JsonValue) {
        match field.name() {
            "message" => {
                self.message = Some(match value {
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                })
            }
            "log.target" => {
                if let JsonValue::String(s) = value {
                    self.log_target = Some(s);
                }
            }
            name if name.starts_with("log.") => {}
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(value.to_string()));
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, JsonValue::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, JsonValue::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, JsonValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, JsonValue::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, JsonValue::String(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static CAPTURED: OnceCell<Arc<Mutex<Vec<LogRecord>>>> = OnceCell::new();

    fn captured() -> Arc<Mutex<Vec<LogRecord>>> {
        CAPTURED
            .get_or_init(|| {
                let sink = Arc::new(Mutex::new(Vec::new()));
                let hook_sink = Arc::clone(&sink);
                set_log_hook(move |rec| hook_sink.lock().unwrap().push(rec.clone()));
                sink
            })
            .clone()
    }

    fn find(message: &str) -> Option<LogRecord> {
        captured()
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.message == message)
            .cloned()
    }

    #[test]
    fn tracing_event_fields_reach_the_hook() {
        captured();
        let _guard = init_logging(LoggingOptions {
            filter: Some("debug".to_string()),
            stderr: false,
        });

        let span = tracing::info_span!("march");
        let _enter = span.enter();
        tracing::info!(row = 3u64, residual = 0.25, converged = true, "row done");

        let rec = find("row done").expect("record captured");
        assert_eq!(rec.level, "INFO");
        assert_eq!(rec.spans, vec!["march".to_string()]);
        assert_eq!(rec.fields.get("row"), Some(&JsonValue::from(3u64)));
        assert_eq!(rec.fields.get("converged"), Some(&JsonValue::Bool(true)));
        assert!(rec.ts.ends_with('Z'));
    }

    #[test]
    fn log_macros_are_bridged() {
        captured();
        let _guard = init_logging(LoggingOptions {
            filter: Some("debug".to_string()),
            stderr: false,
        });

        log::debug!(target: "simalg_solver::newton", "newton finished");

        let rec = find("newton finished").expect("record captured");
        assert_eq!(rec.level, "DEBUG");
        assert_eq!(rec.target, "simalg_solver::newton");
        assert!(rec.fields.is_empty());
    }

    #[test]
    fn record_serializes_without_empty_parts() {
        let rec = LogRecord {
            ts: "2024-01-01T00:00:00.000Z".to_string(),
            level: "WARN".to_string(),
            target: "simalg_pde".to_string(),
            message: "slow cell".to_string(),
            spans: Vec::new(),
            fields: Map::new(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("spans").is_none());
        assert!(json.get("fields").is_none());
        let back: LogRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }
}
