use std::collections::VecDeque;

use crate::models::{ActivityAction, ActivityEntry};

/// How many entries the log keeps unless configured otherwise.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 10;

/// Bounded LIFO history. The front of the deque is the top of the stack;
/// once the log is over capacity the back (oldest) entry falls off.
#[derive(Debug)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero capacity is bumped to one so the latest action is always
    /// visible.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, action: ActivityAction, details: impl Into<String>) {
        self.push_entry(ActivityEntry::new(action, details));
    }

    pub fn push_entry(&mut self, entry: ActivityEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Remove and return the most recent entry.
    pub fn pop(&mut self) -> Option<ActivityEntry> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }

    /// Most recent first.
    pub fn all(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Up to `count` of the most recent entries, newest first.
    pub fn tail(&self, count: usize) -> Vec<ActivityEntry> {
        self.entries.iter().take(count).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One formatted line per entry, newest first.
    pub fn render_lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}
