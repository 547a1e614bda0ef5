use crate::error::ReasoningServiceError;
use crate::profile::{ModelProfile, ReasoningConfig};
use crate::service::{Prompt, ReasoningService};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful answer from [`ReasoningClient::invoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub content: String,
    /// Model that produced the answer
    pub model: String,
    /// Number of attempts used, 1-based
    pub attempts: u32,
    /// Whether the fallback profile was in use when the call succeeded
    pub switched_to_fallback: bool,
}

/// Wraps a [`ReasoningService`] with retry, exponential backoff and a
/// fallback profile.
///
/// Built once per run and shared by reference; it holds no state that
/// outlives a single call, so the fallback switch never leaks between calls.
pub struct ReasoningClient {
    service: Arc<dyn ReasoningService>,
    config: ReasoningConfig,
}

impl ReasoningClient {
    pub fn new(
        service: Arc<dyn ReasoningService>,
        config: ReasoningConfig,
    ) -> Result<Self, ReasoningServiceError> {
        if config.max_retries == 0 {
            return Err(ReasoningServiceError::Misconfigured(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if config.primary.model.trim().is_empty() || config.fallback.model.trim().is_empty() {
            return Err(ReasoningServiceError::Misconfigured(
                "model names must not be empty".to_string(),
            ));
        }

        Ok(Self { service, config })
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    pub async fn invoke(&self, prompt: &Prompt) -> Result<Invocation, ReasoningServiceError> {
        let max_attempts = self.config.max_retries;
        let mut profile: &ModelProfile = &self.config.primary;
        let mut switched = false;
        let mut attempt = 1;

        loop {
            debug!(
                "Invoking reasoning service with {} (attempt {}/{})",
                profile.model, attempt, max_attempts
            );

            match self.service.complete(profile, prompt).await {
                Ok(completion) => {
                    if attempt > 1 {
                        info!(
                            "Reasoning service answered on attempt {}/{}",
                            attempt, max_attempts
                        );
                    }
                    return Ok(Invocation {
                        content: completion.content,
                        model: completion.model,
                        attempts: attempt,
                        switched_to_fallback: switched,
                    });
                }
                Err(e) => {
                    warn!(
                        "Reasoning attempt {}/{} with {} failed: {}",
                        attempt, max_attempts, profile.model, e
                    );

                    if attempt >= max_attempts {
                        return Err(ReasoningServiceError::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }

                    let delay = self.config.backoff_delay(attempt);
                    debug!("Waiting {:?} before next attempt", delay);
                    tokio::time::sleep(delay).await;

                    if attempt == 2 && !switched {
                        info!(
                            "Switching from {} to fallback profile {}",
                            profile.model, self.config.fallback.model
                        );
                        profile = &self.config.fallback;
                        switched = true;
                    }

                    attempt += 1;
                }
            }
        }
    }

    /// Invokes every prompt concurrently. The batch fails as a whole if any
    /// single invocation exhausts its retries.
    pub async fn batch_invoke(
        &self,
        prompts: &[Prompt],
    ) -> Result<Vec<Invocation>, ReasoningServiceError> {
        info!("Invoking reasoning service for a batch of {}", prompts.len());

        let invocations = try_join_all(prompts.iter().map(|prompt| self.invoke(prompt))).await?;

        info!("Batch of {} completed", invocations.len());
        Ok(invocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReasoningError, Result};
    use crate::service::Completion;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a fixed script of outcomes and records which model each
    /// attempt used.
    struct ScriptedService {
        script: Mutex<VecDeque<std::result::Result<String, String>>>,
        models_seen: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
                models_seen: Mutex::new(Vec::new()),
            }
        }

        fn models_seen(&self) -> Vec<String> {
            self.models_seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReasoningService for ScriptedService {
        async fn complete(&self, profile: &ModelProfile, _prompt: &Prompt) -> Result<Completion> {
            self.models_seen.lock().unwrap().push(profile.model.clone());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(content)) => Ok(Completion {
                    content,
                    model: profile.model.clone(),
                }),
                Some(Err(message)) => Err(ReasoningError::Other(message)),
                None => Err(ReasoningError::Other("script exhausted".to_string())),
            }
        }
    }

    /// Fails for prompts containing "fail", succeeds otherwise.
    struct SelectiveService;

    #[async_trait]
    impl ReasoningService for SelectiveService {
        async fn complete(&self, profile: &ModelProfile, prompt: &Prompt) -> Result<Completion> {
            if prompt.user.contains("fail") {
                Err(ReasoningError::Other("refused".to_string()))
            } else {
                Ok(Completion {
                    content: format!("answer: {}", prompt.user),
                    model: profile.model.clone(),
                })
            }
        }
    }

    fn client_with(service: Arc<dyn ReasoningService>) -> ReasoningClient {
        ReasoningClient::new(service, ReasoningConfig::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let service = Arc::new(ScriptedService::new(vec![Ok("done")]));
        let client = client_with(service.clone());

        let invocation = client.invoke(&Prompt::new("hello")).await.unwrap();

        assert_eq!(invocation.content, "done");
        assert_eq!(invocation.attempts, 1);
        assert!(!invocation.switched_to_fallback);
        assert_eq!(service.models_seen(), vec!["gpt-4o"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_twice_then_succeed_switches_profile() {
        let service = Arc::new(ScriptedService::new(vec![
            Err("timeout"),
            Err("rate limited"),
            Ok("third time lucky"),
        ]));
        let client = client_with(service.clone());

        let started = tokio::time::Instant::now();
        let invocation = client.invoke(&Prompt::new("hello")).await.unwrap();

        assert_eq!(invocation.content, "third time lucky");
        assert_eq!(invocation.attempts, 3);
        assert!(invocation.switched_to_fallback);
        assert_eq!(invocation.model, "gpt-4o-mini");
        assert_eq!(service.models_seen(), vec!["gpt-4o", "gpt-4o", "gpt-4o-mini"]);

        // 2^1 + 2^2 seconds of backoff
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_carries_last_error() {
        let service = Arc::new(ScriptedService::new(vec![
            Err("first"),
            Err("second"),
            Err("third"),
        ]));
        let client = client_with(service.clone());

        let err = client.invoke(&Prompt::new("hello")).await.unwrap_err();

        match err {
            ReasoningServiceError::Exhausted { attempts, ref last } => {
                assert_eq!(attempts, 3);
                assert!(last.to_string().contains("third"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(service.models_seen().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_configuration_does_not_sleep() {
        let service = Arc::new(ScriptedService::new(vec![Err("nope")]));
        let client = ReasoningClient::new(
            service.clone(),
            ReasoningConfig::default().with_max_retries(1),
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        let err = client.invoke(&Prompt::new("hello")).await.unwrap_err();

        assert!(matches!(err, ReasoningServiceError::Exhausted { attempts: 1, .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_state_does_not_leak_between_calls() {
        let service = Arc::new(ScriptedService::new(vec![
            Err("a"),
            Err("b"),
            Ok("fallback answer"),
            Ok("primary answer"),
        ]));
        let client = client_with(service.clone());

        let first = client.invoke(&Prompt::new("one")).await.unwrap();
        let second = client.invoke(&Prompt::new("two")).await.unwrap();

        assert!(first.switched_to_fallback);
        assert!(!second.switched_to_fallback);
        assert_eq!(second.model, "gpt-4o");
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_invoke_preserves_order() {
        let client = client_with(Arc::new(SelectiveService));
        let prompts = vec![Prompt::new("a"), Prompt::new("b"), Prompt::new("c")];

        let invocations = client.batch_invoke(&prompts).await.unwrap();

        let contents: Vec<_> = invocations.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["answer: a", "answer: b", "answer: c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_invoke_fails_whole_batch() {
        let client = client_with(Arc::new(SelectiveService));
        let prompts = vec![Prompt::new("ok"), Prompt::new("please fail"), Prompt::new("ok too")];

        let err = client.batch_invoke(&prompts).await.unwrap_err();

        assert!(matches!(err, ReasoningServiceError::Exhausted { attempts: 3, .. }));
    }

    #[test]
    fn test_rejects_zero_retries() {
        let result = ReasoningClient::new(
            Arc::new(SelectiveService),
            ReasoningConfig::default().with_max_retries(0),
        );
        assert!(matches!(result, Err(ReasoningServiceError::Misconfigured(_))));
    }

    #[test]
    fn test_rejects_empty_model_name() {
        let result = ReasoningClient::new(
            Arc::new(SelectiveService),
            ReasoningConfig::default().with_fallback(ModelProfile::new("  ")),
        );
        assert!(matches!(result, Err(ReasoningServiceError::Misconfigured(_))));
    }
}
