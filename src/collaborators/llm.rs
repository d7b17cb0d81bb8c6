//! Language-model client contract and a scriptable mock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::StepError;

/// A prompt-in, text-out language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, StepError>;
}

/// Deterministic mock: replays scripted replies in order, optionally
/// failing the first N calls (for exercising retry paths). Once scripted
/// replies run out it echoes the prompt.
#[derive(Default)]
pub struct MockLlm {
    replies: Mutex<VecDeque<String>>,
    failures: AtomicU32,
}

impl MockLlm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply to be returned by a future `generate` call.
    #[must_use]
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(reply.into());
        self
    }

    /// Makes the next `n` calls fail with a provider error.
    #[must_use]
    pub fn failing(self, n: u32) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String, StepError> {
        let took_failure = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took_failure {
            return Err(StepError::Provider {
                provider: "mock-llm",
                message: "scripted failure".into(),
            });
        }
        match self.replies.lock().pop_front() {
            Some(reply) => Ok(reply),
            None => Ok(format!("echo: {prompt}")),
        }
    }
}
