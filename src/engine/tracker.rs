//! Session owner of the position store.

use super::aggregator::Aggregator;
use super::overlay::Overlay;
use super::store::PositionBook;
use crate::domain::{Position, TransactionReceipt, TransactionRecord};
use crate::error::EngineError;
use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Store and overlay of one account session.
#[derive(Debug, Default)]
struct TrackerState {
    book: PositionBook,
    overlay: Overlay,
}

/// Serializes every write to the per-account stores.
///
/// Each account owns its own book and overlay, so a refresh for one account
/// never replaces another account's entries or pending marks. Fetches run
/// without the lock and merge only once complete, so a dropped refresh future
/// never touches a store.
#[derive(Debug)]
pub struct PositionTracker {
    aggregator: Aggregator,
    sessions: Mutex<HashMap<Address, TrackerState>>,
}

impl PositionTracker {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Address, TrackerState>> {
        // State is only mutated through complete transitions, so a poisoned
        // guard still holds consistent books.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` on the session of `account`, opening it if needed.
    fn with_session<T>(&self, account: &Address, f: impl FnOnce(&mut TrackerState) -> T) -> T {
        let mut sessions = self.lock();
        f(sessions.entry(*account).or_default())
    }

    /// Number of configured (version, chain) indexing sources.
    pub fn source_count(&self) -> usize {
        self.aggregator.source_count()
    }

    /// Marked transactions across every session.
    pub fn pending_count(&self) -> usize {
        self.lock()
            .values()
            .map(|state| state.overlay.pending_count())
            .sum()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Fetch and merge the current set of `account`. Returns its number of
    /// current entries.
    pub async fn refresh_current(&self, account: &Address) -> Result<usize, EngineError> {
        let fetched = self.aggregator.fetch_current(Some(account)).await?;
        self.with_session(account, |state| {
            let TrackerState { book, overlay } = state;
            overlay.merge_current(book, fetched);
            debug!("Current set of {} now holds {} positions", account, book.current_len());
            Ok(book.current_len())
        })
    }

    /// Fetch and replace the past set of `account`. Returns its number of
    /// past entries.
    pub async fn refresh_past(&self, account: &Address) -> Result<usize, EngineError> {
        let fetched = self.aggregator.fetch_past(Some(account)).await?;
        self.with_session(account, |state| {
            state.book.merge_past(fetched);
            Ok(state.book.past_len())
        })
    }

    pub fn mark_pending(&self, account: &Address, record: &TransactionRecord) -> Result<(), EngineError> {
        self.with_session(account, |state| state.overlay.mark_pending(&mut state.book, record))
    }

    pub fn reject_transaction(&self, account: &Address, record: &TransactionRecord) -> bool {
        self.with_session(account, |state| {
            state.overlay.reject_transaction(&mut state.book, record)
        })
    }

    pub fn apply_confirmed(
        &self,
        account: &Address,
        record: &TransactionRecord,
        receipt: &TransactionReceipt,
    ) -> Result<(), EngineError> {
        self.with_session(account, |state| {
            state.overlay.apply_confirmed(&mut state.book, record, receipt)
        })
    }

    pub fn current_sorted(&self, account: &Address) -> Vec<Position> {
        self.lock()
            .get(account)
            .map(|state| state.book.current_sorted())
            .unwrap_or_default()
    }

    pub fn past_sorted(&self, account: &Address) -> Vec<Position> {
        self.lock()
            .get(account)
            .map(|state| state.book.past_sorted())
            .unwrap_or_default()
    }

    /// Copy of the store of `account`.
    pub fn book(&self, account: &Address) -> PositionBook {
        self.lock()
            .get(account)
            .map(|state| state.book.clone())
            .unwrap_or_default()
    }
}
