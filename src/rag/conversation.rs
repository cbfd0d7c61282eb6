//! Conversation state carried between turns.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One question and the model's raw answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Ordered exchanges of a chat session, oldest first.
///
/// Holds at most `max_exchanges` exchanges, dropping the oldest; zero means
/// no limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    exchanges: VecDeque<Exchange>,
    max_exchanges: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Conversation {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            exchanges: VecDeque::new(),
            max_exchanges,
        }
    }

    /// Append a completed exchange.
    pub fn record(&mut self, exchange: Exchange) {
        self.exchanges.push_back(exchange);
        if self.max_exchanges > 0 {
            while self.exchanges.len() > self.max_exchanges {
                self.exchanges.pop_front();
            }
        }
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    /// History in `Human:` / `Assistant:` lines for prompt templates.
    pub fn render_history(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAssistant: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
