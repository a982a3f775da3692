//! Position engine: store, fan-out aggregation and the optimistic overlay.
//!
//! - [`PositionBook`] owns the current and past sets.
//! - [`Aggregator`] pulls positions from every indexing source concurrently.
//! - [`Overlay`] tracks submitted transactions and runs the reducer table on confirmation.
//! - [`PositionTracker`] keeps one book and overlay per account behind one lock.

pub mod aggregator;
pub mod overlay;
pub mod reducer;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{Aggregator, IndexerRegistry, UnderlyingAttribute, DEFAULT_PAGE_SIZE};
pub use overlay::Overlay;
pub use store::PositionBook;
pub use tracker::PositionTracker;

#[cfg(test)]
mod tests {
    use super::test_support::sample_position;
    use super::*;
    use crate::domain::{ChainId, PositionKey, PositionVersion, TxHash};
    use std::collections::HashMap;

    #[test]
    fn test_merge_current_preserves_pending_hash() {
        let mut book = PositionBook::new();
        let mut pending = sample_position(1, PositionVersion::V4, ChainId(10));
        pending.pending_transaction = TxHash::new("0xabc");
        book.upsert(pending);

        let fresh = sample_position(1, PositionVersion::V4, ChainId(10));
        let mut fetched = HashMap::new();
        fetched.insert(fresh.key.clone(), fresh);
        book.merge_current(fetched.clone());
        book.merge_current(fetched);

        let key = PositionKey::onchain(1u64, PositionVersion::V4);
        assert_eq!(book.get(&key).unwrap().pending_transaction, TxHash::new("0xabc"));
        assert_eq!(book.current_len(), 1);
    }

    #[test]
    fn test_merge_current_keeps_pending_creations_and_drops_stale() {
        let mut book = PositionBook::new();
        let mut creation = sample_position(0, PositionVersion::V4, ChainId(10));
        creation.key = PositionKey::pending_creation(TxHash::new("0xnew"), PositionVersion::V4);
        book.upsert(creation.clone());
        book.upsert(sample_position(2, PositionVersion::V4, ChainId(10)));

        book.merge_current(HashMap::new());

        assert!(book.contains(&creation.key));
        assert_eq!(book.current_len(), 1);
    }

    #[test]
    fn test_sorted_views_by_start_descending() {
        let mut book = PositionBook::new();
        for id in [3u64, 1, 2] {
            book.upsert(sample_position(id, PositionVersion::V4, ChainId(10)));
        }
        let ids: Vec<u64> = book
            .current_sorted()
            .iter()
            .map(|p| p.started_at / 100)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_move_to_archive() {
        let mut book = PositionBook::new();
        let position = sample_position(1, PositionVersion::V4, ChainId(10));
        let key = position.key.clone();
        book.upsert(position);

        assert!(book.move_to_archive(&key, |p| p.remaining_swaps = 0));
        assert!(!book.move_to_archive(&key, |_| {}));
        assert_eq!(book.get_past(&key).unwrap().remaining_swaps, 0);
        assert_eq!(book.past_sorted().len(), 1);
    }
}
