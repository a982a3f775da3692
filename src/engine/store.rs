//! In-memory repository of current and past positions.

use crate::domain::{Position, PositionKey, TxHash};
use std::collections::HashMap;

/// Canonical position store for one account session.
///
/// Ordering is not stored; [`PositionBook::current_sorted`] and
/// [`PositionBook::past_sorted`] build the display order on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionBook {
    current: HashMap<PositionKey, Position>,
    past: HashMap<PositionKey, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.current.get(key)
    }

    pub fn get_mut(&mut self, key: &PositionKey) -> Option<&mut Position> {
        self.current.get_mut(key)
    }

    pub fn get_past(&self, key: &PositionKey) -> Option<&Position> {
        self.past.get(key)
    }

    pub fn contains(&self, key: &PositionKey) -> bool {
        self.current.contains_key(key)
    }

    /// Insert or replace a current position under its own key.
    pub fn upsert(&mut self, position: Position) -> Option<Position> {
        self.current.insert(position.key.clone(), position)
    }

    pub fn remove(&mut self, key: &PositionKey) -> Option<Position> {
        self.current.remove(key)
    }

    /// Move a current position into the past set, letting `finalize` adjust the
    /// archived copy. Returns false when the key is not current.
    pub fn move_to_archive<F>(&mut self, key: &PositionKey, finalize: F) -> bool
    where
        F: FnOnce(&mut Position),
    {
        match self.current.remove(key) {
            Some(mut position) => {
                finalize(&mut position);
                self.past.insert(key.clone(), position);
                true
            }
            None => false,
        }
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn current(&self) -> impl Iterator<Item = &Position> {
        self.current.values()
    }

    pub fn past(&self) -> impl Iterator<Item = &Position> {
        self.past.values()
    }

    /// Replace the current set with freshly fetched data.
    ///
    /// Remote data never carries pending metadata, so an in-flight hash on the
    /// previous copy is carried over. Optimistic creations are kept as they only
    /// leave through confirmation or rejection.
    pub fn merge_current(&mut self, fetched: HashMap<PositionKey, Position>) {
        let mut next = fetched;
        for (key, position) in next.iter_mut() {
            if let Some(previous) = self.current.get(key) {
                if previous.has_pending() {
                    position.pending_transaction = previous.pending_transaction.clone();
                }
            }
        }
        for (key, position) in self.current.drain() {
            if key.is_pending_creation() {
                next.insert(key, position);
            }
        }
        self.current = next;
    }

    /// Replace the past set with freshly fetched data.
    pub fn merge_past(&mut self, fetched: HashMap<PositionKey, Position>) {
        self.past = fetched;
    }

    /// Keys of current positions whose pending hash is `hash`.
    pub fn pending_keys(&self, hash: &TxHash) -> Vec<PositionKey> {
        self.current
            .iter()
            .filter(|(_, p)| &p.pending_transaction == hash)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn current_sorted(&self) -> Vec<Position> {
        sorted_by_start_desc(self.current.values())
    }

    pub fn past_sorted(&self) -> Vec<Position> {
        sorted_by_start_desc(self.past.values())
    }
}

fn sorted_by_start_desc<'a>(positions: impl Iterator<Item = &'a Position>) -> Vec<Position> {
    let mut out: Vec<Position> = positions.cloned().collect();
    out.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.key.cmp(&b.key))
    });
    out
}
