//! Sample-context log enrichment.
//!
//! [`SampleContextFormat`] wraps the stock `tracing-subscriber` formatters
//! (full text or flattened JSON). For records from the configured namespaces
//! (the HTTP client libraries by default), it resolves the active sample and:
//!
//! - prefixes the rendered message with `[<uuid> <task>/<id>/<epoch> <model>] `
//! - in JSON mode, attaches the same identity as discrete attributes
//!
//! Everything else, and every record logged outside a sample, goes straight to
//! the wrapped formatter. The enrichment is switched by an [`Enrichment`] flag,
//! so it can be attached and detached while the subscriber stays installed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{Format, Full, Json, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::context::{SampleContext, sample_context};

/// Namespaces enriched by default.
pub const DEFAULT_NAMESPACES: &[&str] = &["reqwest", "hyper", "hyper_util", "h2"];

/// On/off switch for enrichment.
#[derive(Debug)]
pub struct Enrichment {
    enabled: AtomicBool,
}

static GLOBAL: Enrichment = Enrichment::new();

impl Enrichment {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    /// Turn enrichment on. Returns `false` if it was already on.
    pub fn install(&self) -> bool {
        self.enabled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Turn enrichment off. Returns `false` if it was already off.
    pub fn uninstall(&self) -> bool {
        self.enabled
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_installed(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Default for Enrichment {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide enrichment switch.
pub fn enrichment() -> &'static Enrichment {
    &GLOBAL
}

/// Output shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
enum Inner {
    Text(Format<Full>),
    Json(Format<Json>),
}

/// Event formatter adding sample context to HTTP client records.
///
/// JSON output expects the layer's fields formatter to be
/// [`JsonFields`](tracing_subscriber::fmt::format::JsonFields), as with any
/// `Format<Json>`.
#[derive(Debug, Clone)]
pub struct SampleContextFormat {
    inner: Inner,
    namespaces: Vec<String>,
    switch: &'static Enrichment,
}

impl SampleContextFormat {
    /// A formatter driven by the process-wide switch.
    pub fn new(format: LogFormat) -> Self {
        let inner = match format {
            LogFormat::Text => Inner::Text(Format::default()),
            LogFormat::Json => Inner::Json(Format::default().json().flatten_event(true)),
        };
        Self {
            inner,
            namespaces: DEFAULT_NAMESPACES.iter().map(|ns| ns.to_string()).collect(),
            switch: enrichment(),
        }
    }

    /// Replace the enriched namespaces.
    pub fn with_namespaces<I, T>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Use a switch other than the process-wide one.
    pub fn with_switch(mut self, switch: &'static Enrichment) -> Self {
        self.switch = switch;
        self
    }

    pub fn format(&self) -> LogFormat {
        match self.inner {
            Inner::Text(_) => LogFormat::Text,
            Inner::Json(_) => LogFormat::Json,
        }
    }

    fn applies_to(&self, target: &str) -> bool {
        self.namespaces.iter().any(|ns| {
            target == ns
                || target
                    .strip_prefix(ns.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }

    /// Sample context for a record from `target`, if it should be enriched.
    fn context_for(&self, target: &str) -> Option<SampleContext> {
        if !self.switch.is_installed() || !self.applies_to(target) {
            return None;
        }
        sample_context()
    }
}

impl Default for SampleContextFormat {
    fn default() -> Self {
        Self::new(LogFormat::Text)
    }
}

impl<S, N> FormatEvent<S, N> for SampleContextFormat
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
        let Some(context) = self.context_for(event.metadata().target()) else {
            return match &self.inner {
                Inner::Text(inner) => inner.format_event(ctx, writer, event),
                Inner::Json(inner) => inner.format_event(ctx, writer, event),
            };
        };

        // Render the stock line, then place the context in front of the message.
        let mut line = String::new();
        let enriched = match &self.inner {
            Inner::Text(inner) => {
                // enriched lines are rendered without colors
                inner
                    .clone()
                    .with_ansi(false)
                    .format_event(ctx, Writer::new(&mut line), event)?;
                let mut fields = String::new();
                ctx.format_fields(Writer::new(&mut fields), event)?;
                prefix_text(&line, &fields, &context)
            }
            Inner::Json(inner) => {
                inner.format_event(ctx, Writer::new(&mut line), event)?;
                enrich_json(&line, &context)
            }
        };
        writer.write_str(enriched.as_deref().unwrap_or(&line))
    }
}

/// Insert the context before the event's fields, which end a full-format line.
fn prefix_text(line: &str, fields: &str, context: &SampleContext) -> Option<String> {
    let (body, end) = match line.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (line, ""),
    };
    let head = body.strip_suffix(fields)?;
    Some(if fields.is_empty() {
        format!("{head}{context}{end}")
    } else {
        format!("{head}{context} {fields}{end}")
    })
}

/// Prefix the `message` of a flattened JSON record and add the sample attributes.
fn enrich_json(line: &str, context: &SampleContext) -> Option<String> {
    let mut record: Map<String, Value> = serde_json::from_str(line.trim_end()).ok()?;
    let message = match record.remove("message") {
        Some(Value::String(message)) => format!("{context} {message}"),
        Some(other) => format!("{context} {other}"),
        None => context.to_string(),
    };
    record.insert("message".into(), message.into());
    let Value::Object(attributes) = serde_json::to_value(context).ok()? else {
        return None;
    };
    record.extend(attributes);
    let mut out = serde_json::to_string(&record).ok()?;
    out.push('\n');
    Some(out)
}
