use std::sync::Arc;
use std::time::Duration;

use scout_logging::{scout_debug, scout_trace};

use crate::clock::Clock;
use crate::error::ScoutError;

/// One look at the chat transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatObservation {
    /// A stop/streaming affordance is visible.
    pub streaming: bool,
    /// Number of assistant replies in the transcript.
    pub reply_count: usize,
    /// Text of the newest assistant reply.
    pub last_reply: String,
}

#[async_trait::async_trait]
pub trait ChatSurface: Send + Sync {
    async fn observe(&self) -> Result<ChatObservation, ScoutError>;
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub poll_interval: Duration,
    /// Consecutive idle polls that must repeat the same text.
    pub stable_polls: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            stable_polls: 2,
        }
    }
}

/// Decides when a streamed reply has finished. There is no completion
/// event, so the transcript is polled until its newest reply stops changing
/// while no stop affordance is shown.
pub struct CompletionDetector {
    clock: Arc<dyn Clock>,
    settings: DetectorSettings,
}

impl CompletionDetector {
    pub fn new(clock: Arc<dyn Clock>, settings: DetectorSettings) -> Self {
        Self { clock, settings }
    }

    /// Wait for a reply newer than `baseline` (the reply count captured
    /// before the prompt was sent) and return its stabilised text.
    pub async fn wait_for_response_complete(
        &self,
        surface: &dyn ChatSurface,
        baseline: usize,
        timeout: Duration,
    ) -> Result<String, ScoutError> {
        let start = self.clock.now();
        let mut candidate: Option<String> = None;
        let mut stable = 0usize;

        loop {
            match surface.observe().await {
                Ok(obs) if obs.streaming => {
                    stable = 0;
                    candidate = None;
                }
                Ok(obs) if obs.reply_count > baseline && !obs.last_reply.trim().is_empty() => {
                    if candidate.as_deref() == Some(obs.last_reply.as_str()) {
                        stable += 1;
                        if stable >= self.settings.stable_polls {
                            scout_debug!("Reply settled after {} stable polls", stable);
                            return Ok(obs.last_reply.trim().to_string());
                        }
                    } else {
                        stable = 0;
                        candidate = Some(obs.last_reply);
                    }
                }
                Ok(_) => {
                    stable = 0;
                    candidate = None;
                }
                Err(e) => {
                    scout_trace!("Chat observation failed: {}", e);
                    stable = 0;
                }
            }

            if self.clock.elapsed_since(start) >= timeout {
                return Err(ScoutError::ResponseTimeout(timeout));
            }
            self.clock.sleep(self.settings.poll_interval).await;
        }
    }
}
