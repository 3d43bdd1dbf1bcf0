//! Context Manager: trims a conversation's message history to a token
//! budget before every provider call (`spec.md` §4.4).
//!
//! Deterministic and pure: the same message slice and config always
//! produce the same trimmed subsequence, grounded in the "pure function
//! over a message slice" shape the pack uses for truncation/pruning
//! (`sa_contextpack::truncation`, `gateway::pruning`).

use chatcore_domain::message::{Message, Role};
use chatcore_domain::trace::TraceEvent;

#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    pub max_tokens: u64,
    pub chars_per_token: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_tokens: 4096, chars_per_token: 4 }
    }
}

pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Estimated token cost of one message: `ceil(len(content) /
    /// chars_per_token) + 20 * |tool_calls|`.
    fn estimate_tokens(&self, message: &Message) -> u64 {
        let chars = message.content.chars().count() as u64;
        let cpt = self.config.chars_per_token.max(1);
        let text_tokens = chars.div_ceil(cpt);
        let tool_call_tokens = message.tool_calls.as_ref().map(|c| c.len() as u64 * 20).unwrap_or(0);
        text_tokens + tool_call_tokens
    }

    /// Importance score: system is always kept (`+inf`), everything else
    /// is `role_weight + 2 * recency` with `recency = (index+1)/N`.
    fn score(&self, message: &Message, index: usize, total: usize) -> f64 {
        if message.role == Role::System {
            return f64::INFINITY;
        }
        let role_weight = match message.role {
            Role::User => 1.0,
            Role::Tool => 0.9,
            Role::Assistant if message.tool_calls.as_ref().is_some_and(|c| !c.is_empty()) => 1.1,
            Role::Assistant => 0.8,
            Role::System => unreachable!("handled above"),
        };
        let recency = (index + 1) as f64 / total.max(1) as f64;
        role_weight + 2.0 * recency
    }

    /// Returns a subsequence of `messages` whose non-system token total is
    /// `<= max_tokens`, always including the (single) system message, in
    /// chronological order.
    pub fn build(&self, messages: &[Message]) -> Vec<Message> {
        let total = messages.len();
        if total == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64, u64)> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| (i, self.score(m, i, total), self.estimate_tokens(m)))
            .collect();

        // Descending score; ties broken by later index first.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(b.0.cmp(&a.0)));

        let mut kept_indices = Vec::new();
        let mut budget_used = 0u64;
        for (index, score, tokens) in &scored {
            if score.is_infinite() {
                // System message: always included, but still charged
                // against the budget (`spec.md` §4.4 step 3).
                kept_indices.push(*index);
                budget_used += tokens;
                continue;
            }
            if budget_used + tokens <= self.config.max_tokens {
                kept_indices.push(*index);
                budget_used += tokens;
            }
        }

        kept_indices.sort_unstable();
        let kept: Vec<Message> = kept_indices.into_iter().map(|i| messages[i].clone()).collect();

        TraceEvent::ContextTrimmed {
            session_id: messages.first().map(|m| m.session_id.clone()).unwrap_or_default(),
            kept_messages: kept.len(),
            dropped_messages: total - kept.len(),
            estimated_tokens: budget_used,
        }
        .emit();

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatcore_domain::message::ToolCall;
    use chrono::Utc;

    fn msg(session_id: &str, seq: u64, role: Role, content: &str) -> Message {
        Message {
            id: format!("m{seq}"),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            seq,
            tool_calls: None,
            tool_call_id: None,
            provider: None,
            model: None,
            cost: None,
            input_tokens: None,
            output_tokens: None,
            metadata: None,
        }
    }

    #[test]
    fn system_message_always_kept_even_alone_over_budget() {
        let manager = ContextManager::new(ContextConfig { max_tokens: 1, chars_per_token: 4 });
        let messages = vec![msg("s1", 0, Role::System, &"x".repeat(400))];
        let kept = manager.build(&messages);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn keeps_system_plus_five_most_recent_user_messages() {
        // max_tokens=120, chars_per_token=4: system 40 chars -> 10 tokens,
        // charged against the budget same as everything else; ten user
        // messages of 80 chars -> 20 tokens each.
        let manager = ContextManager::new(ContextConfig { max_tokens: 120, chars_per_token: 4 });
        let mut messages = vec![msg("s1", 0, Role::System, &"s".repeat(40))];
        for i in 0..10 {
            messages.push(msg("s1", i + 1, Role::User, &"u".repeat(80)));
        }
        let kept = manager.build(&messages);

        assert_eq!(kept[0].role, Role::System);
        assert_eq!(kept.len(), 6); // system + 5 most recent user messages (120 / 20 = 6)
        let kept_seqs: Vec<u64> = kept.iter().map(|m| m.seq).collect();
        assert_eq!(kept_seqs, vec![0, 6, 7, 8, 9, 10]);
        // chronological order preserved
        assert!(kept.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[test]
    fn oversized_individual_message_is_excluded_not_fatal() {
        let manager = ContextManager::new(ContextConfig { max_tokens: 50, chars_per_token: 4 });
        let messages = vec![
            msg("s1", 0, Role::System, "sys"),
            msg("s1", 1, Role::User, &"x".repeat(1000)), // way over budget alone
            msg("s1", 2, Role::User, "short"),
        ];
        let kept = manager.build(&messages);
        let kept_seqs: Vec<u64> = kept.iter().map(|m| m.seq).collect();
        assert_eq!(kept_seqs, vec![0, 2]);
    }

    #[test]
    fn assistant_with_tool_calls_scores_higher_than_plain_assistant() {
        let manager = ContextManager::new(ContextConfig { max_tokens: 1000, chars_per_token: 4 });
        let mut with_calls = msg("s1", 1, Role::Assistant, "calling a tool");
        with_calls.tool_calls = Some(vec![ToolCall { id: "t1".into(), name: "read".into(), input: serde_json::json!({}) }]);
        let plain = msg("s1", 1, Role::Assistant, "calling a tool");

        assert!(manager.score(&with_calls, 1, 2) > manager.score(&plain, 1, 2));
    }

    #[test]
    fn result_is_deterministic_across_runs() {
        let manager = ContextManager::new(ContextConfig { max_tokens: 40, chars_per_token: 4 });
        let messages = vec![
            msg("s1", 0, Role::System, "sys"),
            msg("s1", 1, Role::User, "one"),
            msg("s1", 2, Role::Tool, "two"),
            msg("s1", 3, Role::Assistant, "three"),
        ];
        let a = manager.build(&messages);
        let b = manager.build(&messages);
        assert_eq!(a.iter().map(|m| m.seq).collect::<Vec<_>>(), b.iter().map(|m| m.seq).collect::<Vec<_>>());
    }
}
