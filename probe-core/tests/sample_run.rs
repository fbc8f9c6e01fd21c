//! End-to-end sample execution: retried model calls, persisted transcript,
//! enriched logs.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use probe_core::{Error, Model, ProbeConfig, Retrier, RetryError, SampleRunner};
use probe_log::sink::{JsonlSink, read_jsonl};
use probe_log::{Event, Sample, Target, active};
use probe_models::providers::{ChatRequest, GenerateConfig, ModelOutput, ModelProvider, Usage};
use probe_models::{ProviderError, Result as ProviderResult};
use probe_observe::{Enrichment, LogFormat, LogLevel};
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::layer::SubscriberExt;

/// Rate limits the first `failures` calls, then answers.
struct RateLimited {
    calls: AtomicU32,
    failures: u32,
}

impl RateLimited {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failures,
        })
    }
}

#[async_trait]
impl ModelProvider for RateLimited {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ChatRequest) -> ProviderResult<ModelOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            tracing::debug!(target: "reqwest::connect", "response 429");
            return Err(ProviderError::from_parts(
                429,
                None,
                None,
                r#"{"error": {"message": "Rate limit reached", "code": "rate_limit_exceeded"}}"#,
            ));
        }
        Ok(ModelOutput::from_content(&request.model, "Paris").with_usage(Usage::new(12, 3)))
    }
}

fn config() -> ProbeConfig {
    ProbeConfig::parse(
        r#"
        [retry]
        max_attempts = 4
        jitter_ms = 0

        [logging]
        level = "warning"
        http_level = "http"
        format = "json"
        "#,
    )
    .unwrap()
}

fn model(provider: Arc<RateLimited>, config: &ProbeConfig) -> Model {
    Model::new(provider, "gpt-4o").with_retrier(Retrier::new(config.retry.policy()))
}

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Buffer {
    type Writer = Buffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Buffer {
    fn lines(&self) -> Vec<serde_json::Value> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn retried_call_is_persisted_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("transcripts.jsonl");
    let config = config();

    let sink = Arc::new(assert_ok!(JsonlSink::open(&path).await));
    let runner = SampleRunner::new("geography", "openai/gpt-4o").with_sink(sink);
    let model = model(RateLimited::new(2), &config);

    let outcome = runner
        .run(Sample::new("Capital of France?").with_id(42_i64), 1, |sample| {
            let model = model.clone();
            async move {
                let output = model
                    .generate(sample.sample.input.messages(), vec![], GenerateConfig::default())
                    .await?;
                sample.transcript.score(Target::One("Paris".into()), output.content.as_text(), None);
                Ok(output.content.as_text())
            }
        })
        .await;

    assert_eq!(assert_ok!(outcome.result), "Paris");
    assert_eq!(outcome.retries, 2);
    assert_eq!(outcome.persisted, Some(3));

    let file = read_jsonl(&path).await.unwrap();
    assert!(file.errors.is_empty());
    let events: Vec<&Event> = file.for_sample(&outcome.id).collect();
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, ["sample_init", "model", "score"]);

    let Event::Model(call) = events[1] else {
        panic!("expected a model event");
    };
    assert_eq!(call.retries, 2);
    assert!(!call.output.is_materialized());
    assert_eq!(call.output.get().unwrap().content.as_text(), "Paris");
    assert_eq!(call.output.get().unwrap().usage.as_ref().unwrap().total_tokens, 15);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_sample() {
    let config = config();
    let runner = SampleRunner::new("geography", "openai/gpt-4o");
    let provider = RateLimited::new(u32::MAX);
    let model = model(provider.clone(), &config);

    let outcome = runner
        .run(Sample::new("Capital of France?"), 1, |sample| {
            let model = model.clone();
            async move {
                model
                    .generate(sample.sample.input.messages(), vec![], GenerateConfig::default())
                    .await
            }
        })
        .await;

    let err = assert_err!(outcome.result);
    assert!(matches!(err, Error::Retry(RetryError::Exhausted { attempts: 4, .. })));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);

    let events = outcome.transcript.events();
    let Event::Error(error) = events.last().unwrap().as_ref() else {
        panic!("expected an error event");
    };
    assert_eq!(error.class.as_deref(), Some("RateLimitError"));
    assert_eq!(error.status, Some(429));
    assert_eq!(error.code.as_deref(), Some("rate_limit_exceeded"));
    assert_eq!(error.attempts, Some(4));
}

#[tokio::test(start_paused = true)]
async fn logs_carry_sample_context() {
    static SWITCH: Enrichment = Enrichment::new();
    SWITCH.install();

    let config = config();
    assert_eq!(config.logging.level, LogLevel::Warning);
    assert_eq!(config.logging.format, LogFormat::Json);

    let buffer = Buffer::default();
    let layer = tracing_subscriber::fmt::layer()
        .fmt_fields(JsonFields::new())
        .event_format(config.logging.event_format().with_switch(&SWITCH))
        .with_writer(buffer.clone());
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("warn,probe_http=debug,reqwest=debug"))
        .with(layer);
    let _guard = tracing::subscriber::set_default(subscriber);

    let runner = SampleRunner::new("geography", "openai/gpt-4o");
    let model = model(RateLimited::new(1), &config);
    let outcome = runner
        .run(Sample::new("Capital of France?").with_id(42_i64), 1, |sample| {
            let model = model.clone();
            async move {
                model
                    .generate(sample.sample.input.messages(), vec![], GenerateConfig::default())
                    .await
            }
        })
        .await;
    assert_ok!(outcome.result);

    let lines = buffer.lines();
    let prefix = format!("[{} geography/42/1 openai/gpt-4o]", outcome.id);

    let retry = lines
        .iter()
        .find(|line| line["message"].as_str().is_some_and(|m| m.contains(" retry 1 ")))
        .expect("retry line");
    assert_eq!(retry["target"], "probe_http");
    assert_eq!(
        retry["message"],
        format!("{prefix} openai/gpt-4o retry 1 (retrying in 3 seconds) [RateLimitError 429 rate_limit_exceeded]")
    );

    let wire = lines
        .iter()
        .find(|line| line["target"] == "reqwest::connect")
        .expect("client line");
    assert_eq!(wire["message"], format!("{prefix} response 429"));
    assert_eq!(wire["sample_uuid"], outcome.id.as_str());
    assert_eq!(wire["sample_id"], "42");
    assert_eq!(wire["sample_model"], "openai/gpt-4o");

    // outside the sample nothing is prefixed
    tracing::debug!(target: "reqwest::connect", "idle");
    let idle = buffer.lines().pop().unwrap();
    assert_eq!(idle["message"], "idle");
    assert!(idle.get("sample_uuid").is_none());
}

#[tokio::test]
async fn sample_scope_ends_with_the_run() {
    let runner = SampleRunner::new("geography", "openai/gpt-4o");
    let outcome = runner
        .run(Sample::new("q"), 1, |_| async {
            Err::<(), _>(Error::LimitExceeded("operator stop".to_string()))
        })
        .await;

    assert_err!(outcome.result);
    assert!(active::current().is_none());
    assert!(active::active_samples().iter().all(|s| s.id != outcome.id));
    assert_eq!(outcome.transcript.events().last().unwrap().kind(), "error");
}
