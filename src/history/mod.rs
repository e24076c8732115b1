//! Snapshot-based undo/redo.
//!
//! Every content-changing mutation records the document state captured just
//! before it. Undo swaps the current state onto the redo stack and hands back
//! the recorded one; redo does the reverse. Recording a new entry forks the
//! timeline and clears the redo stack.

use std::collections::VecDeque;
use tracing::debug;

use crate::document::DocumentState;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// What produced the change, e.g. "edit ed0" or "merge ed0+ed1".
    pub label: String,
    pub state: DocumentState,
}

#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_depth: usize,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Push the state from before a mutation. Drops the oldest entry once
    /// the undo stack exceeds `max_depth`.
    pub fn record(&mut self, label: &str, prior: DocumentState) {
        self.redo_stack.clear();
        self.undo_stack.push_back(HistoryEntry {
            label: label.to_string(),
            state: prior,
        });
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        debug!(label, undo_depth = self.undo_stack.len(), "History entry recorded");
    }

    /// Returns the state to restore, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: DocumentState) -> Option<DocumentState> {
        let entry = self.undo_stack.pop_back()?;
        debug!(
            label = %entry.label,
            undo_remaining = self.undo_stack.len(),
            "Undo"
        );
        self.redo_stack.push(HistoryEntry {
            label: entry.label.clone(),
            state: current,
        });
        Some(entry.state)
    }

    pub fn redo(&mut self, current: DocumentState) -> Option<DocumentState> {
        let entry = self.redo_stack.pop()?;
        debug!(
            label = %entry.label,
            redo_remaining = self.redo_stack.len(),
            "Redo"
        );
        self.undo_stack.push_back(HistoryEntry {
            label: entry.label.clone(),
            state: current,
        });
        Some(entry.state)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Label of the entry `undo` would restore.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.label.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
