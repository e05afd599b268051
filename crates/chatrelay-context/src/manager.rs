//! Context manager implementation

use std::collections::HashMap;
use std::sync::Arc;

use chatrelay_runtime::{CompletionProvider, CompletionRequest};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::context::{ChannelContext, Turn};
use crate::error::ContextResult;
use crate::sanitize::sanitize;
use crate::window::ContextWindow;

type ChannelSlot = Arc<Mutex<ChannelContext>>;

/// Owns the conversation of every channel and answers addressed messages.
///
/// Each channel has its own lock, held for a whole [`ContextManager::respond`]
/// call including the completion round trip. Calls for the same channel run
/// one after another; calls for different channels do not wait on each other.
pub struct ContextManager {
    channels: RwLock<HashMap<String, ChannelSlot>>,
    window: ContextWindow,
    provider: Arc<dyn CompletionProvider>,
    system_prompt: String,
    clock: Arc<dyn Clock>,
}

impl ContextManager {
    pub fn new(
        window: ContextWindow,
        provider: Arc<dyn CompletionProvider>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            window,
            provider,
            system_prompt: system_prompt.into(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn window(&self) -> &ContextWindow {
        &self.window
    }

    /// Answers `text` in `channel_id`, using the channel's recent turns as context.
    ///
    /// On a completion failure the new user turn stays in the channel unanswered.
    pub async fn respond(&self, channel_id: &str, text: &str) -> ContextResult<String> {
        let slot = self.channel_slot(channel_id).await;
        let mut context = slot.lock().await;

        let now = self.clock.now();
        let expired = context.prune_expired(now, self.window.expiry_seconds());

        context.push(Turn::user(format!("{text}{}", self.window.answer_hint), now));
        let trimmed = context.trim(self.window.turn_limit(), self.window.trim_strategy);

        let request = CompletionRequest {
            messages: context.to_messages(),
            system: Some(self.system_prompt.clone()).filter(|s| !s.is_empty()),
            model: None,
            max_tokens: self.window.max_output_tokens,
        };
        debug!(
            channel = channel_id,
            expired,
            trimmed,
            turns = context.len(),
            messages = request.messages.len(),
            provider = self.provider.name(),
            "requesting completion"
        );

        let response = self.provider.complete(request).await.map_err(|err| {
            warn!(channel = channel_id, error = %err, "completion failed");
            err
        })?;

        let reply = sanitize(&response.content, self.window.max_reply_chars);
        let answered_at = self.clock.now();
        if let Some(turn) = context.last_mut() {
            turn.attach_response(Turn::assistant(reply.clone(), answered_at));
        }
        info!(channel = channel_id, chars = reply.chars().count(), "completion relayed");

        Ok(reply)
    }

    /// Copy of a channel's current turns, if the channel has been seen.
    pub async fn snapshot(&self, channel_id: &str) -> Option<ChannelContext> {
        let slot = self.channels.read().await.get(channel_id).cloned()?;
        let context = slot.lock().await;
        Some(context.clone())
    }

    /// Channel ids with a context, in no particular order.
    pub async fn channels(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    async fn channel_slot(&self, channel_id: &str) -> ChannelSlot {
        if let Some(slot) = self.channels.read().await.get(channel_id) {
            return Arc::clone(slot);
        }
        let mut channels = self.channels.write().await;
        Arc::clone(channels.entry(channel_id.to_string()).or_insert_with(|| {
            debug!(channel = channel_id, "creating channel context");
            Arc::new(Mutex::new(ChannelContext::new()))
        }))
    }

    #[cfg(test)]
    async fn seed(&self, channel_id: &str, context: ChannelContext) {
        let slot = self.channel_slot(channel_id).await;
        *slot.lock().await = context;
    }
}
