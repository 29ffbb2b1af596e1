//! Global tracing subscriber with an optional InfluxDB line protocol sink for metrics.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use tracing::field::Field;
use tracing::field::Visit;
use tracing::Event;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter;
use tracing_subscriber::filter::FilterExt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;

/// Events whose target contains this marker go to the metrics file only.
const METRICS_TARGET: &str = "metrics";

struct InfluxDBFormatter;

#[derive(Default)]
struct FieldVisitor {
    tags: BTreeMap<&'static str, String>,
    fields: BTreeMap<&'static str, String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            return;
        }
        match name.strip_prefix("tag_") {
            Some(tag) => {
                self.tags.insert(tag, escape(value.trim_matches('"')));
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, format!("{value}i"));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, format!("{value}i"));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name().starts_with("tag_") {
            self.insert(field, value.to_string());
        } else {
            self.insert(field, format!("\"{}\"", value.replace('"', "\\\"")));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

fn escape(value: &str) -> String {
    value
        .replace(' ', "\\ ")
        .replace(',', "\\,")
        .replace('=', "\\=")
}

/// Formats one line of InfluxDB line protocol.
fn encode_line(
    measurement: &str,
    tags: &BTreeMap<&str, String>,
    fields: &BTreeMap<&str, String>,
    timestamp: u128,
) -> String {
    let mut line = escape(measurement);
    for (key, value) in tags {
        let _ = write!(line, ",{key}={value}");
    }
    line.push(' ');
    let fields = fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str(&fields);
    let _ = write!(line, " {timestamp}");
    line
}

impl<S, N> FormatEvent<S, N> for InfluxDBFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if visitor.fields.is_empty() {
            return Ok(());
        }

        let target = event.metadata().target();
        let measurement = target
            .strip_prefix(METRICS_TARGET)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(target);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        writeln!(
            writer,
            "{}",
            encode_line(measurement, &visitor.tags, &visitor.fields, timestamp)
        )
    }
}

/// Initiates the global tracing subscriber.
///
/// Human readable output goes to stderr. When `metrics_file` is given, events under the
/// `metrics` targets are written there as line protocol and the returned guard must be kept
/// alive until the program exits.
pub(crate) fn init(metrics_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let fmt_layer = utils::logging::get_fmt_layer().with_filter(
        utils::logging::env_filter().and(filter::filter_fn(|metadata| {
            !metadata.target().contains(METRICS_TARGET)
        })),
    );

    let Some(metrics_file) = metrics_file else {
        registry().with(fmt_layer).init();
        return Ok(None);
    };

    let directory = match metrics_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = metrics_file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid metrics file `{}`", metrics_file.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .with_context(|| format!("failed to open metrics file `{}`", metrics_file.display()))?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let metrics_layer = layer()
        .event_format(InfluxDBFormatter)
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|metadata| {
            metadata.target().contains(METRICS_TARGET)
        }));

    registry().with(fmt_layer).with(metrics_layer).init();
    Ok(Some(file_guard))
}
