//! Context window policy

use serde::{Deserialize, Serialize};

/// Context window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextWindow {
    /// Turns older than this many seconds are dropped on the next message
    pub expiry_secs: u64,
    /// Maximum turns retained per channel; `0` still keeps the turn being answered
    pub max_turns: usize,
    /// Generation limit passed to the completion service
    pub max_output_tokens: u32,
    /// Maximum characters in a relayed reply
    pub max_reply_chars: usize,
    /// Suffix appended to every user message
    pub answer_hint: String,
    /// How the window is brought back under `max_turns`
    pub trim_strategy: TrimStrategy,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            expiry_secs: 2 * 60 * 60,
            max_turns: 20,
            max_output_tokens: 100,
            max_reply_chars: 420,
            answer_hint: " (limit answer to 200 characters)".to_string(),
            trim_strategy: TrimStrategy::DropOldestTwo,
        }
    }
}

impl ContextWindow {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            ..Default::default()
        }
    }

    /// Expiry window in whole seconds, saturated to fit timestamp arithmetic.
    pub fn expiry_seconds(&self) -> i64 {
        i64::try_from(self.expiry_secs).unwrap_or(i64::MAX)
    }

    /// A window always keeps room for the turn being answered.
    pub fn turn_limit(&self) -> usize {
        self.max_turns.max(1)
    }
}

/// Strategy for handling a window that grew past `max_turns`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimStrategy {
    /// Drop the two oldest turns, answered or not
    DropOldestTwo,
    /// Discard unanswered turns first, then the oldest answered ones
    MatchedPairs,
}
