//! Line formatting shared by every log sink.
//!
//! Each record carries the service name and environment. JSON output is one
//! serialized object per line with the fields of every enclosing span
//! flattened in; console output delegates to the compact
//! formatter behind a `[svc/env]` prefix.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{Compact, Format, Writer};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

use crate::utils::logger::{Encoding, LogConfig};

#[derive(Debug, Clone)]
pub struct ServiceFormat {
    service: String,
    environment: String,
    encoding: Encoding,
    with_caller: bool,
    with_spans: bool,
    console: Format<Compact, ChronoUtc>,
}

impl ServiceFormat {
    pub fn new(cfg: &LogConfig) -> Self {
        let console = tracing_subscriber::fmt::format()
            .compact()
            .with_timer(ChronoUtc::rfc_3339())
            .with_target(true)
            .with_file(cfg.enable_caller)
            .with_line_number(cfg.enable_caller);

        Self {
            service: cfg.service_name.clone(),
            environment: cfg.environment.clone(),
            encoding: cfg.encoding,
            with_caller: cfg.enable_caller,
            with_spans: cfg.enable_stacktrace,
            console,
        }
    }

    pub fn is_json(&self) -> bool {
        self.encoding == Encoding::Json
    }

    fn format_json<S, N>(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        N: for<'a> FormatFields<'a> + 'static,
    {
        let meta = event.metadata();
        let mut record = Map::new();
        record.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        record.insert(
            "level".to_string(),
            Value::String(meta.level().as_str().to_ascii_lowercase()),
        );
        record.insert("svc".to_string(), Value::String(self.service.clone()));
        record.insert("env".to_string(), Value::String(self.environment.clone()));
        record.insert("target".to_string(), Value::String(meta.target().to_string()));

        if self.with_caller {
            if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
                record.insert("caller".to_string(), Value::String(format!("{file}:{line}")));
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        record.insert(
            "msg".to_string(),
            Value::String(visitor.message.unwrap_or_default()),
        );
        for (key, value) in visitor.fields {
            record.entry(key).or_insert(value);
        }

        if let Some(scope) = ctx.event_scope() {
            let mut context = Map::new();
            let mut chain = Vec::new();
            for span in scope.from_root() {
                let extensions = span.extensions();
                let fields = extensions
                    .get::<FormattedFields<N>>()
                    .map(|f| f.fields.as_str())
                    .unwrap_or_default();
                // inner spans override outer ones
                context.extend(span_fields(fields));
                if fields.is_empty() || fields == "{}" {
                    chain.push(Value::String(span.name().to_string()));
                } else {
                    chain.push(Value::String(format!("{}{}", span.name(), fields)));
                }
            }
            for (key, value) in context {
                record.entry(key).or_insert(value);
            }
            if self.with_spans && *meta.level() == Level::ERROR && !chain.is_empty() {
                record.insert("spans".to_string(), Value::Array(chain));
            }
        }

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

impl<S, N> FormatEvent<S, N> for ServiceFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        match self.encoding {
            Encoding::Json => self.format_json(ctx, writer, event),
            Encoding::Console => {
                write!(writer, "[{}/{}] ", self.service, self.environment)?;
                self.console.format_event(ctx, writer, event)
            }
        }
    }
}

/// Span fields recorded by `JsonFields`; anything else carries no structure.
fn span_fields(fields: &str) -> Map<String, Value> {
    serde_json::from_str(fields).unwrap_or_default()
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}
