use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::SetupError;

/// Collects event fields into a JSON map.
#[derive(Default)]
struct FieldCollector {
    fields: Map<String, Value>,
}

impl Visit for FieldCollector {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}

/// One JSON object per line, laid out after the OpenTelemetry log data model.
#[derive(Clone)]
struct OtelJsonFormatter {
    service_name: String,
    service_version: String,
}

/// Renames `event_name`/`event_domain` fields to their dotted OTel keys.
fn semantic_attributes(mut fields: Map<String, Value>) -> Map<String, Value> {
    for (field, key) in [("event_name", "event.name"), ("event_domain", "event.domain")] {
        if let Some(v) = fields.remove(field) {
            fields.insert(key.to_string(), v);
        }
    }
    fields
}

fn severity_number(level: &Level) -> u64 {
    match *level {
        Level::TRACE => 1,
        Level::DEBUG => 5,
        Level::INFO => 9,
        Level::WARN => 13,
        Level::ERROR => 17,
    }
}

impl<S, N> FormatEvent<S, N> for OtelJsonFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut attributes = semantic_attributes(collector.fields);
        let body = attributes
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| metadata.name().to_string());

        attributes.insert("code.target".to_string(), Value::from(metadata.target()));
        if let Some(file) = metadata.file() {
            attributes.insert("code.filepath".to_string(), Value::from(file));
        }
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".to_string(), Value::from(line));
        }
        if let Some(span) = ctx.lookup_current() {
            attributes.insert("span.name".to_string(), Value::from(span.name()));
        }

        let mut resource = Map::new();
        resource.insert("service.name".to_string(), Value::from(self.service_name.as_str()));
        resource.insert(
            "service.version".to_string(),
            Value::from(self.service_version.as_str()),
        );

        let mut root = Map::new();
        root.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        root.insert("severity_text".to_string(), Value::from(metadata.level().as_str()));
        root.insert(
            "severity_number".to_string(),
            Value::from(severity_number(metadata.level())),
        );
        root.insert("body".to_string(), Value::from(body));
        root.insert("resource".to_string(), Value::Object(resource));
        root.insert("attributes".to_string(), Value::Object(attributes));

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}

/// Installs the global tracing subscriber described by `logging_config`.
///
/// `RUST_LOG` directives are honoured on top of the configured level.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), SetupError> {
    let level = LevelFilter::from_str(logging_config.level.trim()).map_err(|_| {
        SetupError::Logging(format!(
            "invalid level '{}'; valid values: trace, debug, info, warn, error",
            logging_config.level
        ))
    })?;

    let filter_layer = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let result = match logging_config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().event_format(OtelJsonFormatter {
                service_name: logging_config.service_name.clone(),
                service_version: logging_config.service_version.clone(),
            }))
            .try_init(),
        // Anything else falls back to the human-readable console output.
        _ => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| SetupError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected() {
        let config = LoggingConfig {
            level: "verbose".to_string(),
            ..LoggingConfig::default()
        };
        let err = init_logging(&config).unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_event_fields_get_dotted_keys() {
        let mut fields = Map::new();
        fields.insert("event_name".to_string(), Value::from("interceptor.refresh.timeout"));
        fields.insert("event_domain".to_string(), Value::from("interceptor"));
        fields.insert("namespace".to_string(), Value::from("portal"));

        let attributes = semantic_attributes(fields);
        assert_eq!(attributes["event.name"], "interceptor.refresh.timeout");
        assert_eq!(attributes["event.domain"], "interceptor");
        assert_eq!(attributes["namespace"], "portal");
        assert!(!attributes.contains_key("event_name"));
    }

    #[test]
    fn test_severity_numbers_follow_otel() {
        assert_eq!(severity_number(&Level::INFO), 9);
        assert_eq!(severity_number(&Level::ERROR), 17);
    }
}
