//! Model wrapper: retried generation recorded on the active transcript.

use std::sync::Arc;

use chrono::Utc;
use probe_log::events::LimitKind;
use probe_log::{ActiveSample, EventMeta, Lazy, ModelEvent, active};
use probe_models::ModelName;
use probe_models::providers::{ChatRequest, GenerateConfig, Message, ModelOutput, ModelProvider, Tool};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result, RetryError};
use crate::retry::Retrier;

/// A provider model with retries and transcript recording.
#[derive(Clone)]
pub struct Model {
    provider: Arc<dyn ModelProvider>,
    name: ModelName,
    retrier: Retrier,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("retrier", &self.retrier)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// `model` is the provider-side model id (e.g. `gpt-4o`).
    pub fn new(provider: Arc<dyn ModelProvider>, model: &str) -> Self {
        let name = ModelName::new(provider.name(), model);
        Self {
            provider,
            name,
            retrier: Retrier::default(),
        }
    }

    pub fn with_retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    /// Full name (`provider/model`).
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Generate a response to `input`.
    ///
    /// Inside a sample the call is checked against the sample's message and
    /// token limits and recorded as a [`ModelEvent`], failed or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retry`] if the provider call did not succeed and
    /// [`Error::LimitExceeded`] if the sample ran out of messages or tokens.
    pub async fn generate(
        &self,
        input: Vec<Message>,
        tools: Vec<Tool>,
        config: GenerateConfig,
    ) -> Result<ModelOutput> {
        let sample = active::current();
        let messages = input.len() as u64;
        if let Some(sample) = &sample {
            check_limit(sample, LimitKind::Message, messages, sample.limits.message)?;
        }

        let meta = EventMeta::now();
        let started = Instant::now();
        let request = ChatRequest::new(self.name.model(), input)
            .with_tools(tools)
            .with_config(config);
        let result = self
            .retrier
            .run(self.name(), self.provider.classifier(), || {
                self.provider.generate(&request)
            })
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        let (output, retries, error) = match &result {
            Ok(retried) => {
                let mut output = retried.value.clone();
                if output.time.is_none() {
                    output.time = Some(elapsed);
                }
                (output, retried.retries(), None)
            }
            Err(err) => {
                warn!(model = %self.name, attempts = err.attempts(), error = %err, "model call failed");
                let mut output = ModelOutput::from_content(self.name.as_str(), "");
                output.error = Some(err.to_string());
                (output, err.attempts().saturating_sub(1), Some(error_summary(err)))
            }
        };
        let tokens = output.usage.as_ref().map_or(0, |usage| usage.total_tokens);

        if let Some(sample) = &sample {
            sample.transcript.append(ModelEvent {
                meta,
                model: self.name.to_string(),
                provider: Some(self.provider.name().to_string()),
                input: request.messages,
                tools: request.tools,
                config: request.config,
                output: Lazy::new(output.clone()),
                retries,
                error,
                time: Some(elapsed),
                completed: Some(Utc::now()),
            });
        }

        let retried = result?;
        debug!(model = %self.name, attempts = retried.attempts, tokens, "model call finished");

        active::add_tokens(tokens);
        active::set_total_messages(messages + 1);
        if let Some(sample) = &sample {
            check_limit(sample, LimitKind::Token, sample.total_tokens(), sample.limits.token)?;
        }
        Ok(output)
    }
}

/// Short error text for the transcript: the provider summary, or the error itself.
fn error_summary(err: &RetryError) -> String {
    err.provider_error()
        .map_or_else(|| err.to_string(), |source| source.summary())
}

/// Record and report a limit the sample has reached.
fn check_limit(
    sample: &ActiveSample,
    kind: LimitKind,
    used: u64,
    limit: Option<u64>,
) -> Result<()> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let reached = match kind {
        LimitKind::Message => used >= limit,
        _ => used > limit,
    };
    if !reached {
        return Ok(());
    }
    let noun = match kind {
        LimitKind::Message => "message",
        _ => "token",
    };
    let message = format!("{noun} limit of {limit} exceeded ({used} used)");
    sample
        .transcript
        .sample_limit(kind, message.clone(), Some(limit as f64));
    Err(Error::LimitExceeded(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use probe_log::{Event, Sample, SampleLimits, Transcript};
    use probe_models::ProviderError;
    use probe_models::providers::Usage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::retry::RetryPolicy;

    /// Fails `failures` times with a rate limit, then echoes the last message.
    struct Scripted {
        calls: AtomicU32,
        failures: u32,
        error: ProviderError,
    }

    impl Scripted {
        fn new(failures: u32, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            })
        }
    }

    #[async_trait]
    impl ModelProvider for Scripted {
        fn name(&self) -> &str {
            "openai"
        }

        async fn generate(&self, request: &ChatRequest) -> probe_models::Result<ModelOutput> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(self.error.clone());
            }
            let last = request.messages.last().map(|m| m.content.as_text()).unwrap_or_default();
            Ok(ModelOutput::from_content(&request.model, format!("Echo: {last}"))
                .with_usage(Usage::new(10, 5)))
        }
    }

    fn rate_limited() -> ProviderError {
        ProviderError::status("RateLimitError", 429, "slow down").with_code("rate_limit_exceeded")
    }

    fn model(provider: Arc<Scripted>) -> Model {
        Model::new(provider, "gpt-4o").with_retrier(Retrier::new(
            RetryPolicy::default()
                .with_jitter(Duration::ZERO)
                .with_max_attempts(Some(3)),
        ))
    }

    fn sample(limits: SampleLimits) -> Arc<ActiveSample> {
        Arc::new(
            ActiveSample::new(
                "mmlu",
                Sample::new("q").with_id(42_i64),
                1,
                "openai/gpt-4o",
                Arc::new(Transcript::new()),
            )
            .with_limits(limits),
        )
    }

    fn model_events(sample: &ActiveSample) -> Vec<ModelEvent> {
        sample
            .transcript
            .events()
            .iter()
            .filter_map(|event| match event.as_ref() {
                Event::Model(model) => Some(model.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn records_retried_call() {
        let provider = Scripted::new(2, rate_limited());
        let model = model(provider.clone());
        let sample = sample(SampleLimits::default());

        let output = active::scope(
            sample.clone(),
            model.generate(vec![Message::user("hi")], vec![], GenerateConfig::default()),
        )
        .await
        .unwrap();

        assert_eq!(output.content.as_text(), "Echo: hi");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        let events = model_events(&sample);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].model, "openai/gpt-4o");
        assert_eq!(events[0].retries, 2);
        assert!(events[0].error.is_none());
        assert_eq!(events[0].output.get().unwrap().content.as_text(), "Echo: hi");

        assert_eq!(sample.retries(), 2);
        assert_eq!(sample.total_tokens(), 15);
        assert_eq!(sample.total_messages(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn records_failed_call() {
        let provider = Scripted::new(u32::MAX, rate_limited());
        let model = model(provider);
        let sample = sample(SampleLimits::default());

        let err = active::scope(
            sample.clone(),
            model.generate(vec![Message::user("hi")], vec![], GenerateConfig::default()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Retry(RetryError::Exhausted { attempts: 3, .. })));
        let events = model_events(&sample);
        assert_eq!(events[0].retries, 2);
        assert_eq!(
            events[0].error.as_deref(),
            Some("RateLimitError 429 rate_limit_exceeded")
        );
    }

    #[tokio::test]
    async fn works_outside_a_sample() {
        let model = model(Scripted::new(0, rate_limited()));
        let output = model
            .generate(vec![Message::user("hi")], vec![], GenerateConfig::default())
            .await
            .unwrap();
        assert_eq!(output.model, "gpt-4o");
    }

    #[tokio::test]
    async fn token_limit_is_recorded() {
        let model = model(Scripted::new(0, rate_limited()));
        let sample = sample(SampleLimits {
            token: Some(10),
            ..Default::default()
        });

        let err = active::scope(
            sample.clone(),
            model.generate(vec![Message::user("hi")], vec![], GenerateConfig::default()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::LimitExceeded(_)));
        let last = sample.transcript.events().last().cloned().unwrap();
        assert_eq!(last.kind(), "sample_limit");
    }

    #[tokio::test]
    async fn message_limit_stops_before_calling() {
        let provider = Scripted::new(0, rate_limited());
        let model = model(provider.clone());
        let sample = sample(SampleLimits {
            message: Some(1),
            ..Default::default()
        });

        let err = active::scope(
            sample,
            model.generate(vec![Message::user("hi")], vec![], GenerateConfig::default()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::LimitExceeded(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
