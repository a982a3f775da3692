//! Fan-out fetch of positions across every configured chain × version source.

use crate::datasource::{IndexerSource, PositionQuery, UnderlyingRequest, UnderlyingResolver};
use crate::domain::{ChainId, Position, PositionKey, PositionStatus, PositionVersion, Underlying};
use crate::error::EngineError;
use alloy::primitives::{Address, U256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Indexing endpoints keyed by (version, chain). Missing pairs are simply not queried.
pub type IndexerRegistry = BTreeMap<(PositionVersion, ChainId), Arc<dyn IndexerSource>>;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

const CURRENT_STATUSES: [PositionStatus; 2] = [PositionStatus::Active, PositionStatus::Completed];
const PAST_STATUSES: [PositionStatus; 1] = [PositionStatus::Terminated];

/// Position field an underlying lookup is written back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderlyingAttribute {
    RemainingLiquidity,
    ToWithdraw,
}

#[derive(Debug, Clone)]
struct UnderlyingLookup {
    key: PositionKey,
    attribute: UnderlyingAttribute,
    request: UnderlyingRequest,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    sources: IndexerRegistry,
    resolver: Arc<dyn UnderlyingResolver>,
    page_size: usize,
}

impl Aggregator {
    pub fn new(sources: IndexerRegistry, resolver: Arc<dyn UnderlyingResolver>) -> Self {
        Self {
            sources,
            resolver,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Active and completed positions of `account`.
    ///
    /// No account yields an empty set, not an error.
    pub async fn fetch_current(
        &self,
        account: Option<&Address>,
    ) -> Result<HashMap<PositionKey, Position>, EngineError> {
        self.fetch(account, &CURRENT_STATUSES).await
    }

    /// Terminated positions of `account`.
    pub async fn fetch_past(
        &self,
        account: Option<&Address>,
    ) -> Result<HashMap<PositionKey, Position>, EngineError> {
        self.fetch(account, &PAST_STATUSES).await
    }

    async fn fetch(
        &self,
        account: Option<&Address>,
        statuses: &[PositionStatus],
    ) -> Result<HashMap<PositionKey, Position>, EngineError> {
        let Some(account) = account else {
            debug!("No account, skipping position fetch");
            return Ok(HashMap::new());
        };
        let query = PositionQuery::new(account, statuses);

        // Dropping the set aborts every in-flight source.
        let mut tasks = JoinSet::new();
        for (&(version, chain_id), source) in &self.sources {
            let source = Arc::clone(source);
            let query = query.clone();
            let page_size = self.page_size;
            tasks.spawn(async move {
                let result = fetch_all_pages(source.as_ref(), &query, page_size).await;
                (version, chain_id, result)
            });
        }

        let mut positions: HashMap<PositionKey, Position> = HashMap::new();
        let mut failed_sources = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (version, chain_id, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    failed_sources += 1;
                    warn!("Indexer task aborted: {}", e);
                    continue;
                }
            };
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    failed_sources += 1;
                    absorb(EngineError::SourceUnavailable {
                        version,
                        chain_id,
                        reason: e.to_string(),
                    })?;
                    continue;
                }
            };

            for record in records {
                match record.to_position(chain_id, version) {
                    Ok(position) => {
                        if let Some(previous) = positions.insert(position.key.clone(), position) {
                            warn!(
                                "Position {} returned by more than one source (chain {})",
                                previous.key, previous.chain_id
                            );
                        }
                    }
                    Err(e) => warn!("Skipping position {} on chain {}: {}", record.id, chain_id, e),
                }
            }
        }

        self.resolve_underlying(&mut positions).await?;

        info!(
            "Fetched {} positions for {} from {} sources ({} failed)",
            positions.len(),
            query.address,
            self.sources.len(),
            failed_sources
        );
        Ok(positions)
    }

    /// One batched resolver call for every wrapped side, scattered back by attribute.
    async fn resolve_underlying(
        &self,
        positions: &mut HashMap<PositionKey, Position>,
    ) -> Result<(), EngineError> {
        let lookups = collect_underlying_lookups(positions.values());
        if lookups.is_empty() {
            return Ok(());
        }

        let requests: Vec<UnderlyingRequest> = lookups.iter().map(|l| l.request.clone()).collect();
        let resolved = self
            .resolver
            .resolve(&requests)
            .await
            .map_err(|e| EngineError::UnderlyingResolutionFailure(e.to_string()))?;

        for lookup in lookups {
            let request_key = lookup.request.key();
            let Some(entry) = resolved.get(&request_key) else {
                absorb(EngineError::ResolverEntryMissing(request_key))?;
                continue;
            };
            if let Some(position) = positions.get_mut(&lookup.key) {
                let field = match lookup.attribute {
                    UnderlyingAttribute::RemainingLiquidity => {
                        &mut position.remaining_liquidity_underlying
                    }
                    UnderlyingAttribute::ToWithdraw => &mut position.to_withdraw_underlying,
                };
                *field = Underlying::Known(entry.underlying_amount);
            }
        }
        Ok(())
    }
}

async fn fetch_all_pages(
    source: &dyn IndexerSource,
    query: &PositionQuery,
    page_size: usize,
) -> Result<Vec<crate::datasource::IndexerPosition>, crate::datasource::DataSourceError> {
    let mut records = Vec::new();
    let mut skip = 0usize;
    loop {
        let page = source.fetch_positions(query, page_size, skip).await?;
        let received = page.len();
        records.extend(page);
        if received < page_size {
            return Ok(records);
        }
        skip += page_size;
    }
}

fn lookup_for(
    position: &Position,
    attribute: UnderlyingAttribute,
    amount: U256,
) -> Option<UnderlyingLookup> {
    let side = match attribute {
        UnderlyingAttribute::RemainingLiquidity => &position.from,
        UnderlyingAttribute::ToWithdraw => &position.to,
    };
    side.primary_underlying().map(|token| UnderlyingLookup {
        key: position.key.clone(),
        attribute,
        request: UnderlyingRequest {
            chain_id: position.chain_id,
            token: token.clone(),
            amount,
        },
    })
}

fn collect_underlying_lookups<'a>(
    positions: impl Iterator<Item = &'a Position>,
) -> Vec<UnderlyingLookup> {
    let mut lookups = Vec::new();
    for position in positions {
        lookups.extend(lookup_for(
            position,
            UnderlyingAttribute::RemainingLiquidity,
            position.remaining_liquidity,
        ));
        lookups.extend(lookup_for(
            position,
            UnderlyingAttribute::ToWithdraw,
            position.to_withdraw,
        ));
    }
    lookups
}

/// Log a soft failure and carry on. Anything else aborts the fetch.
fn absorb(err: EngineError) -> Result<(), EngineError> {
    if err.is_soft() {
        warn!("{}", err);
        Ok(())
    } else {
        Err(err)
    }
}
