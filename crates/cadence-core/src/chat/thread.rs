//! Per-user conversation threads kept in process memory.
//!
//! Each thread holds the most recent user/assistant exchanges so follow-up
//! messages reach the model with their conversational context. Threads are
//! lost on restart; long-term recall goes through semantic memory instead.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use cadence_types::llm::ChatMessage;
use cadence_types::user::UserId;

pub const DEFAULT_THREAD_CAPACITY: usize = 20;

pub fn thread_key(user: Option<UserId>) -> String {
    match user {
        Some(id) => format!("user:{id}"),
        None => "local".to_string(),
    }
}

pub struct ConversationThreads {
    capacity: usize,
    threads: Mutex<HashMap<String, VecDeque<ChatMessage>>>,
}

impl ConversationThreads {
    /// `capacity` is the number of messages retained per thread.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn history(&self, key: &str) -> Vec<ChatMessage> {
        self.threads
            .lock()
            .get(key)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn append_exchange(&self, key: &str, user_message: &str, reply: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut threads = self.threads.lock();
        let thread = threads.entry(key.to_string()).or_default();
        thread.push_back(ChatMessage::user(user_message));
        thread.push_back(ChatMessage::assistant(reply));
        while thread.len() > self.capacity {
            thread.pop_front();
        }
    }

    pub fn clear(&self, key: &str) {
        self.threads.lock().remove(key);
    }
}

impl Default for ConversationThreads {
    fn default() -> Self {
        Self::new(DEFAULT_THREAD_CAPACITY)
    }
}
