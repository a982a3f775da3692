//! Optimistic overlay: pending, rejected and confirmed transactions.
//!
//! Each operation is idempotent per transaction hash. A hash that has been
//! rejected or confirmed is settled and every later call with it is a no-op.

use super::reducer::{self, synthesize_creation};
use super::store::PositionBook;
use crate::domain::{
    check_swap_count, ensure_consistent_chain_set, Position, PositionKey, TransactionKind,
    TransactionReceipt, TransactionRecord, TxHash,
};
use crate::error::EngineError;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Settled hashes remembered for idempotency. The oldest is forgotten first.
pub const SETTLED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct Overlay {
    /// Per marked hash, the entries its mark installed that are still owned
    /// by the overlay (synthesized creations and caller snapshots).
    marked: HashMap<TxHash, Vec<PositionKey>>,
    settled: HashSet<TxHash>,
    settled_order: VecDeque<TxHash>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, hash: &TxHash) -> bool {
        self.marked.contains_key(hash)
    }

    pub fn is_settled(&self, hash: &TxHash) -> bool {
        self.settled.contains(hash)
    }

    pub fn pending_count(&self) -> usize {
        self.marked.len()
    }

    /// Show `record` as in flight.
    ///
    /// All checks run before the first write: on error the book is unchanged.
    pub fn mark_pending(
        &mut self,
        book: &mut PositionBook,
        record: &TransactionRecord,
    ) -> Result<(), EngineError> {
        if self.settled.contains(&record.hash) || self.marked.contains_key(&record.hash) {
            debug!("Transaction {} already tracked, skipping mark", record.hash);
            return Ok(());
        }
        if record.kind.is_position_neutral() {
            return Ok(());
        }
        if let Some(swaps) = record.kind.requested_swaps() {
            check_swap_count(swaps)?;
        }

        if let TransactionKind::NewPosition(request) = &record.kind {
            let key = PositionKey::pending_creation(record.hash.clone(), request.version);
            let position = synthesize_creation(record, request, key.clone())?;
            book.upsert(position);
            self.marked.insert(record.hash.clone(), vec![key]);
            info!("Marked creation {} pending", record.hash);
            return Ok(());
        }

        let targets = record.kind.targets();
        if targets.is_empty() {
            return Err(EngineError::EmptyBulkOperation);
        }

        let mut resolved: Vec<(&Position, bool)> = Vec::with_capacity(targets.len());
        for key in &targets {
            match book.get(key) {
                Some(position) => resolved.push((position, false)),
                None => {
                    let snapshot = record
                        .snapshot_for(key)
                        .ok_or_else(|| EngineError::PositionNotFound(key.clone()))?;
                    resolved.push((snapshot, true));
                }
            }
        }
        ensure_consistent_chain_set(resolved.iter().map(|(p, _)| *p))?;
        for (position, _) in &resolved {
            if position.has_pending() && position.pending_transaction != record.hash {
                return Err(EngineError::PendingConflict {
                    key: position.key.clone(),
                    pending: position.pending_transaction.clone(),
                });
            }
        }

        let snapshots: Vec<Position> = resolved
            .into_iter()
            .filter(|(_, from_snapshot)| *from_snapshot)
            .map(|(p, _)| p.clone())
            .collect();
        let mut installed = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            installed.push(snapshot.key.clone());
            book.upsert(snapshot);
        }
        for key in &targets {
            if let Some(position) = book.get_mut(key) {
                position.pending_transaction = record.hash.clone();
            }
        }

        info!(
            "Marked {} pending on {} position(s): {}",
            record.kind.name(),
            targets.len(),
            record.hash
        );
        self.marked.insert(record.hash.clone(), installed);
        Ok(())
    }

    /// Merge a fresh current set into `book`.
    ///
    /// A fetched entry replaces any snapshot a mark installed under the same
    /// key, so that key is no longer the overlay's to remove on rejection.
    pub fn merge_current(&mut self, book: &mut PositionBook, fetched: HashMap<PositionKey, Position>) {
        for installed in self.marked.values_mut() {
            installed.retain(|key| !fetched.contains_key(key));
        }
        book.merge_current(fetched);
    }

    /// Undo a mark. Returns false when `record` was never marked.
    ///
    /// Entries the mark installed are removed. Every other entry carrying the
    /// hash only has its pending flag cleared.
    pub fn reject_transaction(&mut self, book: &mut PositionBook, record: &TransactionRecord) -> bool {
        let Some(installed) = self.marked.remove(&record.hash) else {
            debug!("Transaction {} was never marked, nothing to reject", record.hash);
            return false;
        };

        for key in &installed {
            book.remove(key);
        }
        clear_pending(book, &record.hash);
        self.settle(record.hash.clone());
        info!("Rejected {} {}", record.kind.name(), record.hash);
        true
    }

    /// Run the canonical reducer for a mined transaction.
    ///
    /// A marked transaction whose target has since left the book (and came
    /// with no snapshot) is treated as already reconciled by the last refresh:
    /// the mark is released and the hash settled.
    pub fn apply_confirmed(
        &mut self,
        book: &mut PositionBook,
        record: &TransactionRecord,
        receipt: &TransactionReceipt,
    ) -> Result<(), EngineError> {
        if self.settled.contains(&record.hash) {
            debug!("Transaction {} already settled", record.hash);
            return Ok(());
        }

        let targets = record.kind.targets();
        let vanished = targets
            .iter()
            .find(|key| !book.contains(key) && record.snapshot_for(key).is_none());
        if let Some(key) = vanished {
            if self.marked.remove(&record.hash).is_some() {
                warn!(
                    "Confirmed {} {} targets {} which is no longer tracked, releasing mark",
                    record.kind.name(),
                    record.hash,
                    key
                );
                clear_pending(book, &record.hash);
                self.settle(record.hash.clone());
                return Ok(());
            }
        }

        let missing: Vec<&Position> = targets
            .iter()
            .filter(|key| !book.contains(key))
            .filter_map(|key| record.snapshot_for(key))
            .collect();

        if missing.is_empty() {
            reducer::apply(book, record, receipt)?;
        } else {
            let mut staged = book.clone();
            for snapshot in missing {
                staged.upsert(snapshot.clone());
            }
            reducer::apply(&mut staged, record, receipt)?;
            *book = staged;
        }

        self.marked.remove(&record.hash);
        self.settle(record.hash.clone());
        info!("Applied confirmed {} {}", record.kind.name(), record.hash);
        Ok(())
    }

    fn settle(&mut self, hash: TxHash) {
        if !self.settled.insert(hash.clone()) {
            return;
        }
        self.settled_order.push_back(hash);
        while self.settled_order.len() > SETTLED_CAPACITY {
            if let Some(oldest) = self.settled_order.pop_front() {
                self.settled.remove(&oldest);
            }
        }
    }
}

fn clear_pending(book: &mut PositionBook, hash: &TxHash) {
    for key in book.pending_keys(hash) {
        if let Some(position) = book.get_mut(&key) {
            position.clear_pending();
        }
    }
}
