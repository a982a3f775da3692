use alloy::primitives::{Address, U256};
use dca_positions::datasource::{
    underlying_key, IndexerPosition, IndexerSource, IndexerSwapInterval, IndexerToken, MockIndexer,
    MockUnderlyingResolver,
};
use dca_positions::domain::{
    ChainId, PositionKey, PositionVersion, TransactionKind, TransactionReceipt, TransactionRecord,
    TxHash, Underlying,
};
use dca_positions::engine::{Aggregator, IndexerRegistry, PositionTracker};
use dca_positions::{DataSourceError, EngineError};
use std::str::FromStr;
use std::sync::Arc;

const USER: &str = "0x00000000000000000000000000000000000000aa";
const OTHER_USER: &str = "0x00000000000000000000000000000000000000bb";
const SHARE: &str = "0x00000000000000000000000000000000000000f1";
const UNDERLYING: &str = "0x00000000000000000000000000000000000000f0";

fn user() -> Address {
    Address::from_str(USER).unwrap()
}

fn plain_token(address: &str, symbol: &str) -> IndexerToken {
    IndexerToken {
        address: address.to_string(),
        decimals: 18,
        symbol: symbol.to_string(),
        name: String::new(),
        kind: "BASE".to_string(),
        underlying_tokens: vec![],
    }
}

fn share_token() -> IndexerToken {
    IndexerToken {
        address: SHARE.to_string(),
        decimals: 6,
        symbol: "yvUSDC".to_string(),
        name: String::new(),
        kind: "YIELD_BEARING_SHARE".to_string(),
        underlying_tokens: vec![IndexerToken {
            decimals: 6,
            ..plain_token(UNDERLYING, "USDC")
        }],
    }
}

fn record(id: u64, owner: &str, status: &str) -> IndexerPosition {
    IndexerPosition {
        id: id.to_string(),
        user: owner.to_string(),
        status: status.to_string(),
        created_at_timestamp: (1_700_000_000 + id).to_string(),
        from: plain_token("0x0000000000000000000000000000000000000001", "DAI"),
        to: plain_token("0x0000000000000000000000000000000000000002", "WETH"),
        swap_interval: IndexerSwapInterval {
            interval: "86400".to_string(),
        },
        rate: "10".to_string(),
        remaining_liquidity: "100".to_string(),
        remaining_swaps: "10".to_string(),
        to_withdraw: "0".to_string(),
        total_deposited: "100".to_string(),
        total_swapped: "0".to_string(),
        total_withdrawn: "0".to_string(),
        total_swaps: "10".to_string(),
        total_executed_swaps: "0".to_string(),
        deposited_rate_underlying: None,
        total_swapped_underlying_accum: None,
        to_withdraw_underlying_accum: None,
        permissions: vec![],
        pair: None,
    }
}

fn registry(entries: Vec<(PositionVersion, u64, MockIndexer)>) -> IndexerRegistry {
    let mut sources = IndexerRegistry::new();
    for (version, chain, indexer) in entries {
        let source: Arc<dyn IndexerSource> = Arc::new(indexer);
        sources.insert((version, ChainId(chain)), source);
    }
    sources
}

#[tokio::test]
async fn test_failed_source_is_skipped() {
    let healthy = MockIndexer::new()
        .with_record(record(1, USER, "ACTIVE"))
        .with_record(record(2, USER, "COMPLETED"));
    let broken = MockIndexer::new().failing(DataSourceError::NetworkError("timeout".into()));
    let aggregator = Aggregator::new(
        registry(vec![
            (PositionVersion::V4, 10, healthy),
            (PositionVersion::V4, 137, broken.clone()),
        ]),
        Arc::new(MockUnderlyingResolver::new()),
    );

    let positions = aggregator.fetch_current(Some(&user())).await.unwrap();

    assert_eq!(positions.len(), 2);
    assert!(positions.contains_key(&PositionKey::onchain(1u64, PositionVersion::V4)));
    assert_eq!(broken.call_count(), 1);
}

#[tokio::test]
async fn test_all_sources_failing_yields_empty_set() {
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new().failing(DataSourceError::RateLimited),
        )]),
        Arc::new(MockUnderlyingResolver::new()),
    );
    assert!(aggregator.fetch_current(Some(&user())).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_account_skips_sources() {
    let indexer = MockIndexer::new().with_record(record(1, USER, "ACTIVE"));
    let aggregator = Aggregator::new(
        registry(vec![(PositionVersion::V4, 10, indexer.clone())]),
        Arc::new(MockUnderlyingResolver::new()),
    );

    assert!(aggregator.fetch_current(None).await.unwrap().is_empty());
    assert_eq!(indexer.call_count(), 0);
}

#[tokio::test]
async fn test_pages_until_short_page() {
    let indexer =
        MockIndexer::new().with_records((1..=5).map(|id| record(id, USER, "ACTIVE")).collect());
    let aggregator = Aggregator::new(
        registry(vec![(PositionVersion::V4, 10, indexer.clone())]),
        Arc::new(MockUnderlyingResolver::new()),
    )
    .with_page_size(2);

    let positions = aggregator.fetch_current(Some(&user())).await.unwrap();
    assert_eq!(positions.len(), 5);
    // 2 + 2 + 1
    assert_eq!(indexer.call_count(), 3);
}

#[tokio::test]
async fn test_exact_multiple_needs_one_empty_page() {
    let indexer =
        MockIndexer::new().with_records((1..=4).map(|id| record(id, USER, "ACTIVE")).collect());
    let aggregator = Aggregator::new(
        registry(vec![(PositionVersion::V4, 10, indexer.clone())]),
        Arc::new(MockUnderlyingResolver::new()),
    )
    .with_page_size(2);

    assert_eq!(aggregator.fetch_current(Some(&user())).await.unwrap().len(), 4);
    assert_eq!(indexer.call_count(), 3);
}

#[tokio::test]
async fn test_status_and_owner_filters() {
    let indexer = MockIndexer::new()
        .with_record(record(1, USER, "ACTIVE"))
        .with_record(record(2, USER, "TERMINATED"))
        .with_record(record(3, OTHER_USER, "ACTIVE"));
    let aggregator = Aggregator::new(
        registry(vec![(PositionVersion::V4, 10, indexer)]),
        Arc::new(MockUnderlyingResolver::new()),
    );

    let current = aggregator.fetch_current(Some(&user())).await.unwrap();
    assert_eq!(current.len(), 1);
    assert!(current.contains_key(&PositionKey::onchain(1u64, PositionVersion::V4)));

    let past = aggregator.fetch_past(Some(&user())).await.unwrap();
    assert_eq!(past.len(), 1);
    assert!(past.contains_key(&PositionKey::onchain(2u64, PositionVersion::V4)));
}

#[tokio::test]
async fn test_same_id_on_two_versions_kept_apart() {
    let aggregator = Aggregator::new(
        registry(vec![
            (
                PositionVersion::V3,
                10,
                MockIndexer::new().with_record(record(7, USER, "ACTIVE")),
            ),
            (
                PositionVersion::V4,
                10,
                MockIndexer::new().with_record(record(7, USER, "ACTIVE")),
            ),
        ]),
        Arc::new(MockUnderlyingResolver::new()),
    );

    let positions = aggregator.fetch_current(Some(&user())).await.unwrap();
    assert_eq!(positions.len(), 2);
    assert!(positions.contains_key(&PositionKey::onchain(7u64, PositionVersion::V3)));
    assert!(positions.contains_key(&PositionKey::onchain(7u64, PositionVersion::V4)));
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let mut bad = record(2, USER, "ACTIVE");
    bad.rate = "not-a-number".to_string();
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new()
                .with_record(record(1, USER, "ACTIVE"))
                .with_record(bad),
        )]),
        Arc::new(MockUnderlyingResolver::new()),
    );

    let positions = aggregator.fetch_current(Some(&user())).await.unwrap();
    assert_eq!(positions.len(), 1);
}

#[tokio::test]
async fn test_resolves_underlying_in_one_batch() {
    let mut first = record(1, USER, "ACTIVE");
    first.from = share_token();
    let mut second = record(2, USER, "ACTIVE");
    second.from = share_token();
    second.remaining_liquidity = "50".to_string();

    let underlying = Address::from_str(UNDERLYING).unwrap();
    let resolver = MockUnderlyingResolver::new()
        .with_entry(underlying_key(ChainId(10), &underlying, U256::from(100u64)), U256::from(103u64))
        .with_entry(underlying_key(ChainId(10), &underlying, U256::from(50u64)), U256::from(51u64));
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new().with_record(first).with_record(second),
        )]),
        Arc::new(resolver.clone()),
    );

    let positions = aggregator.fetch_current(Some(&user())).await.unwrap();

    assert_eq!(resolver.call_count(), 1);
    assert_eq!(resolver.received().len(), 2);
    let one = &positions[&PositionKey::onchain(1u64, PositionVersion::V4)];
    assert_eq!(
        one.remaining_liquidity_underlying,
        Underlying::Known(U256::from(103u64))
    );
    assert_eq!(one.to_withdraw_underlying, Underlying::NotApplicable);
    let two = &positions[&PositionKey::onchain(2u64, PositionVersion::V4)];
    assert_eq!(
        two.remaining_liquidity_underlying,
        Underlying::Known(U256::from(51u64))
    );
}

#[tokio::test]
async fn test_no_wrapped_sides_skips_resolver() {
    let resolver = MockUnderlyingResolver::new();
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new().with_record(record(1, USER, "ACTIVE")),
        )]),
        Arc::new(resolver.clone()),
    );

    aggregator.fetch_current(Some(&user())).await.unwrap();
    assert_eq!(resolver.call_count(), 0);
}

#[tokio::test]
async fn test_missing_resolver_entry_leaves_unknown() {
    let mut wrapped = record(1, USER, "ACTIVE");
    wrapped.from = share_token();
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new().with_record(wrapped),
        )]),
        Arc::new(MockUnderlyingResolver::new()),
    );

    let positions = aggregator.fetch_current(Some(&user())).await.unwrap();
    let position = &positions[&PositionKey::onchain(1u64, PositionVersion::V4)];
    assert_eq!(position.remaining_liquidity_underlying, Underlying::Unknown);
}

#[tokio::test]
async fn test_resolver_failure_fails_the_fetch() {
    let mut wrapped = record(1, USER, "ACTIVE");
    wrapped.from = share_token();
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new().with_record(wrapped),
        )]),
        Arc::new(
            MockUnderlyingResolver::new().failing(DataSourceError::HttpError {
                status: 502,
                message: "bad gateway".into(),
            }),
        ),
    );

    let err = aggregator.fetch_current(Some(&user())).await.unwrap_err();
    assert!(matches!(err, EngineError::UnderlyingResolutionFailure(_)));
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new()
                .with_record(record(1, USER, "ACTIVE"))
                .with_record(record(2, USER, "ACTIVE"))
                .with_record(record(3, USER, "TERMINATED")),
        )]),
        Arc::new(MockUnderlyingResolver::new()),
    );
    let tracker = PositionTracker::new(aggregator);

    assert_eq!(tracker.refresh_current(&user()).await.unwrap(), 2);
    let first = tracker.current_sorted(&user());
    assert_eq!(tracker.refresh_current(&user()).await.unwrap(), 2);
    assert_eq!(tracker.current_sorted(&user()), first);

    assert_eq!(tracker.refresh_past(&user()).await.unwrap(), 1);
    assert_eq!(tracker.refresh_past(&user()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_current_sorted_newest_first() {
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new()
                .with_record(record(1, USER, "ACTIVE"))
                .with_record(record(3, USER, "ACTIVE"))
                .with_record(record(2, USER, "ACTIVE")),
        )]),
        Arc::new(MockUnderlyingResolver::new()),
    );
    let tracker = PositionTracker::new(aggregator);
    tracker.refresh_current(&user()).await.unwrap();

    let ids: Vec<String> = tracker
        .current_sorted(&user())
        .iter()
        .map(|p| p.key.to_string())
        .collect();
    assert_eq!(ids, vec!["3-v4", "2-v4", "1-v4"]);
}

#[tokio::test]
async fn test_accounts_keep_separate_sessions() {
    let other = Address::from_str(OTHER_USER).unwrap();
    let aggregator = Aggregator::new(
        registry(vec![(
            PositionVersion::V4,
            10,
            MockIndexer::new()
                .with_record(record(1, USER, "ACTIVE"))
                .with_record(record(2, OTHER_USER, "ACTIVE")),
        )]),
        Arc::new(MockUnderlyingResolver::new()),
    );
    let tracker = PositionTracker::new(aggregator);
    let key = PositionKey::onchain(1u64, PositionVersion::V4);
    let add_funds = TransactionRecord::new(
        TxHash::new("0xadd"),
        ChainId(10),
        TransactionKind::AddFunds {
            position: key.clone(),
            new_funds: U256::from(100u64),
        },
    );

    tracker.refresh_current(&user()).await.unwrap();
    tracker.mark_pending(&user(), &add_funds).unwrap();
    tracker.refresh_current(&other).await.unwrap();

    assert_eq!(tracker.session_count(), 2);
    assert_eq!(tracker.pending_count(), 1);
    let mine = tracker.current_sorted(&user());
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].pending_transaction, TxHash::new("0xadd"));
    let theirs: Vec<String> = tracker
        .current_sorted(&other)
        .iter()
        .map(|p| p.key.to_string())
        .collect();
    assert_eq!(theirs, vec!["2-v4"]);

    tracker
        .apply_confirmed(&user(), &add_funds, &TransactionReceipt::default())
        .unwrap();
    assert_eq!(tracker.pending_count(), 0);
    let confirmed = tracker.book(&user());
    let position = confirmed.get(&key).unwrap();
    assert_eq!(position.remaining_liquidity, U256::from(200u64));
    assert!(!position.has_pending());
    assert!(tracker.book(&other).get(&key).is_none());
}

#[tokio::test]
async fn test_unknown_account_has_no_positions() {
    let aggregator = Aggregator::new(registry(vec![]), Arc::new(MockUnderlyingResolver::new()));
    let tracker = PositionTracker::new(aggregator);
    assert!(tracker.current_sorted(&user()).is_empty());
    assert!(tracker.past_sorted(&user()).is_empty());
    assert_eq!(tracker.session_count(), 0);
}
