/*!
 * Mock chat provider for testing.
 *
 * Batch prompts are answered segment by segment, split on the translator's
 * delimiter, so tests can script exactly how each line comes back:
 * - `MockProvider::working()` - every segment is translated
 * - `MockProvider::echo()` - every segment comes back unchanged
 * - `MockProvider::dropping_last_segment()` - batch replies lose their last segment
 * - `MockProvider::intermittent(n)` - every nth request fails with a 503
 * - `MockProvider::failing()` - every request fails
 * - `MockProvider::empty()` - every reply is empty
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::collaborators::translator::DELIM;
use crate::errors::ProviderError;
use crate::providers::{ChatPrompt, ChatProvider};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a translation of every segment
    Working,
    /// Returns the input unchanged
    Echo,
    /// Drops the last segment of multi-segment replies
    DropLastSegment,
    /// Fails every Nth request
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns an empty reply
    Empty,
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Shared between clones
    request_count: Arc<AtomicUsize>,
    segment_response: Option<fn(&str) -> String>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            segment_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn dropping_last_segment() -> Self {
        Self::new(MockBehavior::DropLastSegment)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set how a single segment is translated
    pub fn with_segment_response(mut self, generator: fn(&str) -> String) -> Self {
        self.segment_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn translate_segment(&self, segment: &str) -> String {
        match self.segment_response {
            Some(generator) => generator(segment),
            None => format!("[TRANSLATED] {}", segment),
        }
    }

    fn answer(&self, user: &str, drop_last: bool) -> String {
        let mut segments: Vec<String> = user
            .split(DELIM)
            .map(|segment| self.translate_segment(segment.trim()))
            .collect();
        if drop_last && segments.len() > 1 {
            segments.pop();
        }
        segments.join(&format!(" {} ", DELIM))
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            segment_response: self.segment_response,
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(self.answer(&prompt.user, false)),
            MockBehavior::Echo => Ok(prompt.user.clone()),
            MockBehavior::DropLastSegment => Ok(self.answer(&prompt.user, true)),
            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.answer(&prompt.user, false))
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
            MockBehavior::Empty => Ok(String::new()),
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("mock is down".to_string())),
            _ => Ok(()),
        }
    }
}
