//! Bounded linear undo/redo over owned snapshots
//!
//! Snapshots are cloned on the way in and handed out by value, so nothing
//! returned from here aliases what is stored. When the undo stack grows past
//! its limit the oldest snapshot is evicted.

use std::collections::VecDeque;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct History<T: Clone> {
    limit: usize,
    undo: VecDeque<T>,
    redo: Vec<T>,
}

impl<T: Clone> History<T> {
    /// History keeping at most `limit` undo steps. A limit of 0 means unbounded.
    pub fn new(limit: usize) -> Self {
        Self { limit, undo: VecDeque::new(), redo: Vec::new() }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Record the state as it was *before* a mutation. Always clears redo.
    pub fn push_state(&mut self, snapshot: &T) {
        self.push_undo(snapshot.clone());
        self.redo.clear();
    }

    /// Step back. `current` becomes redoable; returns `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, current: &T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(previous)
    }

    pub fn redo(&mut self, current: &T) -> Option<T> {
        let next = self.redo.pop()?;
        self.push_undo(current.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, snapshot: T) {
        self.undo.push_back(snapshot);

        if self.limit > 0 {
            while self.undo.len() > self.limit {
                self.undo.pop_front();
            }
        }
    }
}

impl<T: Clone> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{AnnotationState, NormalizedRect};

    #[test]
    fn undo_on_empty_history_is_a_no_op() {
        let mut history: History<Vec<u32>> = History::default();
        let current = vec![1, 2];

        assert!(history.undo(&current).is_none());
        assert!(history.redo(&current).is_none());
        assert!(!history.can_redo());
    }

    #[test]
    fn n_mutations_then_n_undos_restore_initial_state() {
        let mut history = History::unbounded();
        let mut state = AnnotationState::new();
        let initial = state.clone();

        for i in 0..10 {
            history.push_state(&state);
            state.push_annotation(1 + i % 3, NormalizedRect::new(0.01 * i as f64, 0.0, 0.1, 0.1));
        }

        for _ in 0..10 {
            state = history.undo(&state).expect("undo step expected");
        }

        assert_eq!(state, initial);
        assert!(!history.can_undo());
    }

    #[test]
    fn redo_restores_state_before_undo() {
        let mut history = History::default();
        let mut state = vec!["a"];

        history.push_state(&state);
        state.push("b");

        let before_undo = state.clone();
        state = history.undo(&state).expect("undo step expected");
        assert_eq!(state, vec!["a"]);

        state = history.redo(&state).expect("redo step expected");
        assert_eq!(state, before_undo);
        assert!(history.can_undo());
    }

    #[test]
    fn push_after_undo_clears_redo() {
        let mut history = History::default();
        let mut state = 1;

        history.push_state(&state);
        state = 2;
        state = history.undo(&state).expect("undo step expected");
        assert!(history.can_redo());

        history.push_state(&state);
        assert!(history.redo(&3).is_none());
    }

    #[test]
    fn returned_snapshots_are_independent_copies() {
        let mut history = History::default();
        let state = vec![1];

        history.push_state(&state);
        let mut restored = history.undo(&vec![1, 2]).expect("undo step expected");
        restored.push(99);

        let redone = history.redo(&restored).expect("redo step expected");
        assert_eq!(redone, vec![1, 2]);
        let undone = history.undo(&redone).expect("undo step expected");
        assert_eq!(undone, vec![1, 99]);
    }

    #[test]
    fn limit_evicts_oldest_snapshots() {
        let mut history = History::new(3);
        for state in 0..5 {
            history.push_state(&state);
        }

        assert_eq!(history.undo_len(), 3);
        assert_eq!(history.undo(&5), Some(4));
        assert_eq!(history.undo(&4), Some(3));
        assert_eq!(history.undo(&3), Some(2));
        assert_eq!(history.undo(&2), None);
    }
}
