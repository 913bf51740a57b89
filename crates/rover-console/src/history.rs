//! Operator history: every typed line, raw scan text and trip label, in order.

use rover_proto::CapacityExceeded;
use serde::Deserialize;
use time::macros::format_description;
use time::OffsetDateTime;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Command,
    ScanText,
    Outcome,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub index: usize,
    pub kind: EntryKind,
    pub text: String,
    pub at: OffsetDateTime,
}

impl HistoryEntry {
    /// Wall-clock `HH:MM:SS` (UTC) of when the entry was recorded.
    pub fn stamp(&self) -> String {
        self.at
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_else(|_| "--:--:--".to_string())
    }
}

/// Bounded, append-only. Indices start at 0 and are never reused; once the
/// log is full further appends are refused.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl HistoryLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)), capacity }
    }

    pub fn append(&mut self, kind: EntryKind, text: impl Into<String>) -> Result<usize, CapacityExceeded> {
        if self.entries.len() >= self.capacity {
            return Err(CapacityExceeded { what: "history", capacity: self.capacity });
        }
        let index = self.entries.len();
        self.entries.push(HistoryEntry { index, kind, text: text.into(), at: OffsetDateTime::now_utc() });
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Index the next append will get.
    pub fn next_index(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev().take(n)
    }
}
