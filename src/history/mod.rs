//! Snapshot-based undo/redo.
//!
//! The stack is a bounded list of immutable entries plus a pointer. Entries at
//! or below the pointer are the past; entries above it can be redone until the
//! next push prunes them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::event::{EventBus, HistoryEvent};
use crate::util::time::timestamp_millis;

mod snapshot;

pub use snapshot::{deserialize_state, DocumentState, EncodedBitmap, SerializedState};
use snapshot::{serialize_state, EncodeCache};

pub const DEFAULT_MAX_STEPS: usize = 50;

/// One labeled point in history. Never changes once pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    pub action: String,
    pub state: SerializedState,
}

/// Which directions the pointer can move in.
///
/// `Empty` covers every stack with nothing to undo or redo, including a stack
/// holding only its initial entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStatus {
    Empty,
    CanUndoOnly,
    CanRedoOnly,
    CanBoth,
}

#[derive(Debug)]
pub struct HistoryManager {
    entries: Vec<Arc<HistoryEntry>>,
    current_index: Option<usize>,
    max_steps: usize,
    batching: bool,
    cache: EncodeCache,
    events: EventBus<HistoryEvent>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl HistoryManager {
    /// `max_steps` is raised to at least one.
    pub fn new(max_steps: usize) -> Self {
        Self {
            entries: Vec::new(),
            current_index: None,
            max_steps: max_steps.max(1),
            batching: false,
            cache: EncodeCache::default(),
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus<HistoryEvent> {
        &self.events
    }

    /// Record `state` as a new entry on top of the current one.
    ///
    /// Returns `Ok(false)` while a batch is open. Any redoable entries are
    /// discarded. When the stack outgrows `max_steps` the oldest entry is
    /// dropped and the pointer stays put, which leaves it on the new entry.
    pub fn push(&mut self, action: impl Into<String>, state: &DocumentState) -> Result<bool> {
        if self.batching {
            return Ok(false);
        }
        let action = action.into();
        let state = serialize_state(state, &mut self.cache)?;

        let keep = self.current_index.map_or(0, |index| index + 1);
        if keep < self.entries.len() {
            log::debug!("Pruning {} redo entries", self.entries.len() - keep);
            self.entries.truncate(keep);
        }

        self.entries.push(Arc::new(HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: timestamp_millis(),
            action,
            state,
        }));

        if self.entries.len() > self.max_steps {
            self.entries.remove(0);
        } else {
            self.current_index = Some(keep);
        }

        log::debug!(
            "History push #{:?} of {}",
            self.current_index,
            self.entries.len()
        );
        self.emit_changed();
        Ok(true)
    }

    /// The entry [`Self::undo`] would move to, without moving.
    pub fn peek_undo(&self) -> Option<Arc<HistoryEntry>> {
        let index = self.current_index.filter(|&index| index > 0)? - 1;
        self.entries.get(index).cloned()
    }

    /// The entry [`Self::redo`] would move to, without moving.
    pub fn peek_redo(&self) -> Option<Arc<HistoryEntry>> {
        if !self.can_redo() {
            return None;
        }
        self.entries
            .get(self.current_index.map_or(0, |index| index + 1))
            .cloned()
    }

    /// Step back. Returns the entry that is now current.
    pub fn undo(&mut self) -> Option<Arc<HistoryEntry>> {
        let index = self.current_index.filter(|&index| index > 0)? - 1;
        self.current_index = Some(index);
        let entry = Arc::clone(&self.entries[index]);

        log::debug!("Undo to '{}'", entry.action);
        self.events.emit(&HistoryEvent::Undo(Arc::clone(&entry)));
        self.emit_changed();
        Some(entry)
    }

    /// Step forward. Returns the entry that is now current.
    pub fn redo(&mut self) -> Option<Arc<HistoryEntry>> {
        if !self.can_redo() {
            return None;
        }
        let index = self.current_index.map_or(0, |index| index + 1);
        self.current_index = Some(index);
        let entry = Arc::clone(&self.entries[index]);

        log::debug!("Redo to '{}'", entry.action);
        self.events.emit(&HistoryEvent::Redo(Arc::clone(&entry)));
        self.emit_changed();
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.current_index.is_some_and(|index| index > 0)
    }

    pub fn can_redo(&self) -> bool {
        match self.current_index {
            Some(index) => index + 1 < self.entries.len(),
            None => !self.entries.is_empty(),
        }
    }

    pub fn status(&self) -> HistoryStatus {
        match (self.can_undo(), self.can_redo()) {
            (false, false) => HistoryStatus::Empty,
            (true, false) => HistoryStatus::CanUndoOnly,
            (false, true) => HistoryStatus::CanRedoOnly,
            (true, true) => HistoryStatus::CanBoth,
        }
    }

    /// Swallow pushes until [`Self::end_batch`] or [`Self::cancel_batch`].
    ///
    /// Batches do not nest: starting one while another is open keeps the open
    /// batch, and the first end or cancel closes it.
    pub fn start_batch(&mut self) {
        if self.batching {
            log::warn!("start_batch called while a batch is already open; continuing it");
            return;
        }
        self.batching = true;
    }

    /// Close the batch with a single entry.
    pub fn end_batch(&mut self, action: impl Into<String>, state: &DocumentState) -> Result<bool> {
        self.batching = false;
        self.push(action, state)
    }

    pub fn cancel_batch(&mut self) {
        self.batching = false;
    }

    pub fn is_batching(&self) -> bool {
        self.batching
    }

    pub fn current_entry(&self) -> Option<Arc<HistoryEntry>> {
        self.current_index
            .and_then(|index| self.entries.get(index))
            .cloned()
    }

    pub fn get_current_state(&self) -> Option<&SerializedState> {
        self.current_index
            .and_then(|index| self.entries.get(index))
            .map(|entry| &entry.state)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn entries(&self) -> &[Arc<HistoryEntry>] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut [Arc<HistoryEntry>] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Shrinking drops the oldest entries first.
    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps.max(1);
        let excess = self.entries.len().saturating_sub(self.max_steps);
        if excess > 0 {
            self.entries.drain(..excess);
            self.current_index = self
                .current_index
                .map(|index| index.saturating_sub(excess));
            self.emit_changed();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_index = None;
        self.batching = false;
        self.cache.clear();
        self.emit_changed();
    }

    fn emit_changed(&self) {
        self.events.emit(&HistoryEvent::Changed {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        });
    }
}
