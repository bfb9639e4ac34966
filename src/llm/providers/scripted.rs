//! Deterministic stand-in for a real model, used by tests.

use crate::llm::{LanguageModel, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

enum Reply {
    Text(String),
    Fail(fn() -> LlmError),
    Delayed(Duration, String),
}

/// Replays queued replies in order; the last reply repeats once the queue drains.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new().then(text)
    }

    pub fn then(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Text(text.to_string()));
        self
    }

    pub fn then_fail(self, error: fn() -> LlmError) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Fail(error));
        self
    }

    pub fn then_delay(self, delay: Duration, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Delayed(delay, text.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().map(|r| match r {
                Reply::Text(text) => Reply::Text(text.clone()),
                Reply::Fail(error) => Reply::Fail(*error),
                Reply::Delayed(delay, text) => Reply::Delayed(*delay, text.clone()),
            })
        };
        reply.unwrap_or_else(|| Reply::Text(String::new()))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        match self.next_reply() {
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) => Err(error()),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
