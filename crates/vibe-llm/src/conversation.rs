//! Message history for one chat session.
//!
//! The system prompt and the repository-context message are pinned at the
//! front; everything after them is the turn history, pruned oldest first.

use crate::types::{ChatMessage, Role};

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    system: Option<ChatMessage>,
    context: Option<ChatMessage>,
    turns: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system: Some(ChatMessage::system(system_prompt)),
            ..Self::default()
        }
    }

    /// Set or replace the repository snapshot sent with every request.
    pub fn replace_context(&mut self, context: impl Into<String>) {
        self.context = Some(ChatMessage::system(context));
    }

    pub fn clear_context(&mut self) {
        self.context = None;
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(ChatMessage::assistant(text));
    }

    /// Interpreter results and other out-of-band notes.
    pub fn push_system(&mut self, text: impl Into<String>) {
        self.turns.push(ChatMessage::system(text));
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// Keep only the last `max_turns` user turns and what followed them.
    ///
    /// A turn starts at a user message, so a pruned history never begins
    /// with an orphaned assistant reply.
    pub fn prune(&mut self, max_turns: usize) {
        let starts: Vec<usize> = self
            .turns
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();
        if starts.len() <= max_turns {
            return;
        }
        let cut = if max_turns == 0 {
            self.turns.len()
        } else {
            starts[starts.len() - max_turns]
        };
        self.turns.drain(..cut);
        tracing::debug!(dropped = cut, kept = self.turns.len(), "pruned conversation");
    }

    /// Messages in request order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.system
            .iter()
            .chain(self.context.iter())
            .chain(self.turns.iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_turns(n: usize) -> Conversation {
        let mut c = Conversation::new("sys");
        c.replace_context("ctx");
        for i in 0..n {
            c.push_user(format!("u{i}"));
            c.push_assistant(format!("a{i}"));
            c.push_system(format!("r{i}"));
        }
        c
    }

    #[test]
    fn messages_keep_pinned_prefix() {
        let c = with_turns(1);
        let m = c.messages();
        assert_eq!(m[0], ChatMessage::system("sys"));
        assert_eq!(m[1], ChatMessage::system("ctx"));
        assert_eq!(m[2], ChatMessage::user("u0"));
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn prune_drops_oldest_whole_turns() {
        let mut c = with_turns(5);
        c.prune(2);
        assert_eq!(c.turns().len(), 6);
        assert_eq!(c.turns()[0], ChatMessage::user("u3"));
        let m = c.messages();
        assert_eq!(m[0].content, "sys");
        assert_eq!(m[1].content, "ctx");
    }

    #[test]
    fn prune_under_limit_is_noop() {
        let mut c = with_turns(3);
        c.prune(15);
        assert_eq!(c.turns().len(), 9);
    }

    #[test]
    fn refresh_replaces_context() {
        let mut c = with_turns(1);
        c.replace_context("new");
        let m = c.messages();
        assert_eq!(m[1].content, "new");
        assert_eq!(m.iter().filter(|m| m.content == "ctx").count(), 0);
    }
}
