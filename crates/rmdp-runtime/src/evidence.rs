#![forbid(unsafe_code)]

//! Bounded FIFO ledger of robust Bellman solves.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::mode::RuntimeMode;

/// How a single solve call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveOutcome {
    /// LP solved to optimality and the solution was extracted.
    Solved,
    /// Inputs failed validation; no LP was built.
    Rejected,
    /// The LP backend or the certificate check failed.
    Failed,
}

/// One record per solve call, written whether or not the call succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveEvidenceEntry {
    pub operation: String,
    pub mode: RuntimeMode,
    pub actions: usize,
    pub outcomes: usize,
    pub kappa: f64,
    pub outcome: SolveOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    pub iterations: usize,
    pub detail: String,
}

/// Caller-owned evidence buffer.
///
/// Capacity is at least one entry; when full the oldest entry is evicted
/// before a new one is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveEvidenceLedger {
    capacity: usize,
    entries: VecDeque<SolveEvidenceEntry>,
}

impl SolveEvidenceLedger {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, entry: SolveEvidenceEntry) {
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently recorded entry.
    #[must_use]
    pub fn latest(&self) -> Option<&SolveEvidenceEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SolveEvidenceEntry> {
        self.entries.iter()
    }

    /// One JSON object per line, oldest first.
    ///
    /// # Errors
    /// The first entry that fails to serialize.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let lines = self
            .entries
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }
}
