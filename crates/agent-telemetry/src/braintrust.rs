//! Braintrust span processor
//!
//! Spans are batched and sent over OTLP/HTTP to Braintrust's ingestion
//! endpoint. They land in the project or experiment named by the
//! `x-bt-parent` header, e.g. `project_name:SlavinScratchArea`.

use crate::{Result, TelemetryError};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{
    BatchConfig, BatchSpanProcessor, Span, SpanData, SpanExporter, SpanProcessor,
};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const TRACES_PATH: &str = "/otel/v1/traces";
const PARENT_HEADER: &str = "x-bt-parent";

/// Attribute stamped on every exported span
pub const PARENT_ATTRIBUTE: &str = "braintrust.parent";

/// Connection settings for [`BraintrustSpanProcessor`]
#[derive(Clone)]
pub struct BraintrustConfig {
    /// Braintrust API key
    pub api_key: String,
    /// API base URL
    pub api_url: String,
    /// Destination, `project_name:<name>` or `experiment_id:<id>`
    pub parent: String,
    /// HTTP timeout per export
    pub timeout: Duration,
}

impl BraintrustConfig {
    /// Settings for the given key, API URL, and parent
    pub fn new(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into(),
            parent: parent.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full ingestion URL
    pub fn endpoint(&self) -> String {
        format!("{}{TRACES_PATH}", self.api_url.trim_end_matches('/'))
    }

    /// OTLP/HTTP exporter carrying the bearer key and parent header
    pub fn exporter(&self) -> Result<opentelemetry_otlp::SpanExporter> {
        if self.api_key.is_empty() {
            return Err(TelemetryError::Configuration(
                "Braintrust API key is empty".to_string(),
            ));
        }
        if self.parent.is_empty() {
            return Err(TelemetryError::Configuration(
                "Braintrust parent is empty".to_string(),
            ));
        }

        let headers = HashMap::from([
            ("Authorization".to_string(), format!("Bearer {}", self.api_key)),
            (PARENT_HEADER.to_string(), self.parent.clone()),
        ]);

        opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(self.endpoint())
            .with_timeout(self.timeout)
            .with_headers(headers)
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))
    }
}

impl fmt::Debug for BraintrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BraintrustConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("parent", &self.parent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Batches spans for Braintrust, tagging each with its parent
#[derive(Debug)]
pub struct BraintrustSpanProcessor {
    parent: String,
    inner: BatchSpanProcessor,
}

impl BraintrustSpanProcessor {
    /// Processor exporting to the endpoint described by `config`
    pub fn new(config: &BraintrustConfig, batch: BatchConfig) -> Result<Self> {
        debug!("Exporting spans to {}", config.endpoint());
        Ok(Self::with_exporter(config.parent.clone(), config.exporter()?, batch))
    }

    /// Processor batching into an arbitrary exporter
    pub fn with_exporter<E>(parent: impl Into<String>, exporter: E, batch: BatchConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        Self {
            parent: parent.into(),
            inner: BatchSpanProcessor::builder(exporter)
                .with_batch_config(batch)
                .build(),
        }
    }

    /// Destination tag, e.g. `project_name:SlavinScratchArea`
    pub fn parent(&self) -> &str {
        &self.parent
    }
}

impl SpanProcessor for BraintrustSpanProcessor {
    fn on_start(&self, span: &mut Span, cx: &Context) {
        self.inner.on_start(span, cx);
    }

    fn on_end(&self, mut span: SpanData) {
        span.attributes
            .push(KeyValue::new(PARENT_ATTRIBUTE, self.parent.clone()));
        self.inner.on_end(span);
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TracerProvider;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    fn config(api_url: &str) -> BraintrustConfig {
        BraintrustConfig::new("bt-key", api_url, "project_name:SlavinScratchArea")
    }

    /// Answers one HTTP request with `status`, returning the request head
    fn serve_once(status: u16) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let head = loop {
                let n = socket.read(&mut buf).unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).into_owned();
                if let Some(end) = text.find("\r\n\r\n") {
                    let head = text[..end].to_string();
                    let length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    while raw.len() < end + 4 + length {
                        let n = socket.read(&mut buf).unwrap();
                        if n == 0 {
                            break;
                        }
                        raw.extend_from_slice(&buf[..n]);
                    }
                    break head;
                }
                assert!(n > 0, "connection closed before headers");
            };

            write!(
                socket,
                "HTTP/1.1 {status} Stub\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            )
            .unwrap();
            head
        });

        (url, handle)
    }

    fn finished_span(name: &'static str) -> SpanData {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_span_processor(
                BatchSpanProcessor::builder(exporter.clone())
                    .with_batch_config(BatchConfig::default())
                    .build(),
            )
            .build();
        provider.tracer("test").start(name).end();
        provider.force_flush().unwrap();
        exporter.get_finished_spans().unwrap().remove(0)
    }

    #[test]
    fn test_endpoint_joins_path() {
        assert_eq!(
            config("https://api.braintrust.dev/").endpoint(),
            "https://api.braintrust.dev/otel/v1/traces"
        );
    }

    #[test]
    fn test_rejects_empty_credentials() {
        let mut cfg = config("https://api.braintrust.dev");
        cfg.api_key.clear();
        assert!(matches!(
            cfg.exporter(),
            Err(TelemetryError::Configuration(_))
        ));

        let mut cfg = config("https://api.braintrust.dev");
        cfg.parent.clear();
        assert!(BraintrustSpanProcessor::new(&cfg, BatchConfig::default()).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", config("https://api.braintrust.dev"));
        assert!(!rendered.contains("bt-key"));
        assert!(rendered.contains("project_name:SlavinScratchArea"));
    }

    #[test]
    fn test_every_span_is_tagged_with_parent() {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::default();
        provider.add_span_processor(
            "braintrust",
            BraintrustSpanProcessor::with_exporter(
                "project_name:Equities",
                exporter.clone(),
                BatchConfig::default(),
            ),
        );

        let tracer = provider.sdk().tracer("test");
        tracer.start("crew.kickoff").end();
        tracer.start("crew.task").end();
        provider.force_flush().unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|span| {
            span.attributes.iter().any(|kv| {
                kv.key.as_str() == PARENT_ATTRIBUTE && kv.value.as_str() == "project_name:Equities"
            })
        }));
    }

    #[test]
    fn test_export_posts_to_traces_endpoint_with_headers() {
        let (url, server) = serve_once(200);
        let processor = BraintrustSpanProcessor::new(&config(&url), BatchConfig::default()).unwrap();
        assert_eq!(processor.parent(), "project_name:SlavinScratchArea");

        let provider = SdkTracerProvider::builder().with_span_processor(processor).build();
        provider.tracer("test").start("crew.kickoff").end();
        provider.force_flush().unwrap();

        let head = server.join().unwrap().to_ascii_lowercase();
        assert!(head.starts_with("post /otel/v1/traces http/1.1"), "{head}");
        assert!(head.contains("authorization: bearer bt-key"));
        assert!(head.contains("x-bt-parent: project_name:slavinscratcharea"));
        assert!(head.contains("content-type: application/x-protobuf"));
    }

    #[test]
    fn test_export_fails_on_rejected_status() {
        let (url, server) = serve_once(500);
        let exporter = config(&url).exporter().unwrap();

        let result = futures::executor::block_on(exporter.export(vec![finished_span("crew.task")]));
        assert!(result.is_err());
        server.join().unwrap();
    }
}
