//! Channel conversation types

use chatrelay_runtime::{ChatMessage, ChatRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::window::TrimStrategy;

/// One message in a channel conversation.
///
/// User turns own their answer in `response`; assistant turns never carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub role: ChatRole,
    pub content: String,
    response: Option<Box<Turn>>,
}

impl Turn {
    pub fn new(role: ChatRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            role,
            content: content.into(),
            response: None,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(ChatRole::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(ChatRole::Assistant, content, timestamp)
    }

    pub fn response(&self) -> Option<&Turn> {
        self.response.as_deref()
    }

    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }

    /// Pairs this turn with its answer. A turn is answered at most once; later
    /// calls leave the first answer in place and return `false`.
    pub fn attach_response(&mut self, response: Turn) -> bool {
        if self.response.is_some() {
            return false;
        }
        self.response = Some(Box::new(response));
        true
    }

    fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().saturating_sub(self.timestamp.timestamp())
    }
}

/// Ordered turns of a single channel, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelContext {
    turns: Vec<Turn>,
}

impl ChannelContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn last_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut()
    }

    /// Removes turns older than `expiry_secs` at `now`. Returns how many were dropped.
    pub fn prune_expired(&mut self, now: DateTime<Utc>, expiry_secs: i64) -> usize {
        let before = self.turns.len();
        self.turns.retain(|turn| turn.age_seconds(now) <= expiry_secs);
        before - self.turns.len()
    }

    /// Brings the context back to at most `limit` turns. The newest turn is
    /// never removed. Returns how many turns were dropped.
    pub fn trim(&mut self, limit: usize, strategy: TrimStrategy) -> usize {
        let limit = limit.max(1);
        let before = self.turns.len();

        match strategy {
            TrimStrategy::DropOldestTwo => {
                // Drops two slots per pass even when they are not an answered pair.
                while self.turns.len() > limit {
                    let count = 2_usize.min(self.turns.len() - 1);
                    self.turns.drain(..count);
                }
            }
            TrimStrategy::MatchedPairs => {
                let newest = self.turns.len().saturating_sub(1);
                let mut index = 0;
                self.turns.retain(|turn| {
                    let keep = turn.is_answered() || index == newest;
                    index += 1;
                    keep
                });
                while self.turns.len() > limit {
                    self.turns.remove(0);
                }
            }
        }

        before - self.turns.len()
    }

    /// Flattens the turns into the request payload: each user turn followed by
    /// its answer, if any.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2);
        for turn in &self.turns {
            messages.push(ChatMessage::new(turn.role, turn.content.clone()));
            if let Some(response) = turn.response() {
                messages.push(ChatMessage::new(response.role, response.content.clone()));
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn answered(question: &str, answer: &str, secs: i64) -> Turn {
        let mut turn = Turn::user(question, at(secs));
        turn.attach_response(Turn::assistant(answer, at(secs + 1)));
        turn
    }

    fn numbered(count: usize) -> ChannelContext {
        ChannelContext::from_turns(
            (0..count)
                .map(|i| answered(&format!("q{i}"), &format!("a{i}"), i as i64))
                .collect(),
        )
    }

    #[test]
    fn attach_response_only_once() {
        let mut turn = Turn::user("hello", at(0));
        assert!(turn.attach_response(Turn::assistant("first", at(1))));
        assert!(!turn.attach_response(Turn::assistant("second", at(2))));
        assert_eq!(turn.response().unwrap().content, "first");
    }

    #[test]
    fn prune_drops_only_turns_past_expiry() {
        let mut context = ChannelContext::from_turns(vec![
            answered("old", "gone", 0),
            answered("edge", "kept", 100),
            answered("new", "kept", 150),
        ]);

        let removed = context.prune_expired(at(200), 100);

        assert_eq!(removed, 1);
        let contents: Vec<_> = context.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["edge", "new"]);
    }

    #[test]
    fn prune_preserves_order_of_survivors() {
        let mut context = ChannelContext::from_turns(vec![
            answered("a", "1", 500),
            answered("stale", "x", 0),
            answered("b", "2", 600),
        ]);

        context.prune_expired(at(0) + Duration::seconds(700), 300);

        let contents: Vec<_> = context.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn drop_oldest_two_removes_first_two_slots() {
        let mut context = numbered(22);

        let removed = context.trim(20, TrimStrategy::DropOldestTwo);

        assert_eq!(removed, 2);
        assert_eq!(context.len(), 20);
        assert_eq!(context.turns()[0].content, "q2");
    }

    #[test]
    fn drop_oldest_two_ignores_pairing_state() {
        let mut context = ChannelContext::from_turns(vec![
            Turn::user("unanswered", at(0)),
            answered("q1", "a1", 1),
            answered("q2", "a2", 2),
            Turn::user("pending", at(10)),
        ]);

        context.trim(2, TrimStrategy::DropOldestTwo);

        let contents: Vec<_> = context.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "pending"]);
    }

    #[test]
    fn drop_oldest_two_loops_until_within_limit() {
        let mut context = numbered(30);

        context.trim(20, TrimStrategy::DropOldestTwo);

        assert!(context.len() <= 20);
        assert_eq!(context.turns().last().unwrap().content, "q29");
    }

    #[test]
    fn trim_never_removes_newest_turn() {
        let mut context = numbered(2);

        context.trim(1, TrimStrategy::DropOldestTwo);

        assert_eq!(context.len(), 1);
        assert_eq!(context.turns()[0].content, "q1");
    }

    #[test]
    fn matched_pairs_discards_stragglers_first() {
        let mut context = ChannelContext::from_turns(vec![
            answered("q0", "a0", 0),
            Turn::user("failed", at(1)),
            answered("q2", "a2", 2),
            Turn::user("current", at(3)),
        ]);

        let removed = context.trim(3, TrimStrategy::MatchedPairs);

        assert_eq!(removed, 1);
        let contents: Vec<_> = context.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q0", "q2", "current"]);
    }

    #[test]
    fn matched_pairs_drops_one_oldest_at_a_time() {
        let mut context = numbered(21);

        context.trim(20, TrimStrategy::MatchedPairs);

        assert_eq!(context.len(), 20);
        assert_eq!(context.turns()[0].content, "q1");
    }

    #[test]
    fn messages_interleave_answers_in_order() {
        let mut context = ChannelContext::from_turns(vec![answered("q0", "a0", 0)]);
        context.push(Turn::user("q1", at(5)));

        let messages = context.to_messages();

        assert_eq!(
            messages,
            vec![
                ChatMessage::user("q0"),
                ChatMessage::assistant("a0"),
                ChatMessage::user("q1"),
            ]
        );
    }

    #[test]
    fn unanswered_turn_serializes_as_lone_user_message() {
        let context = ChannelContext::from_turns(vec![
            Turn::user("failed", at(0)),
            Turn::user("retry", at(1)),
        ]);

        let roles: Vec<_> = context.to_messages().iter().map(|m| m.role).collect();

        assert_eq!(roles, vec![ChatRole::User, ChatRole::User]);
    }
}
