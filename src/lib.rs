pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod permissions;
pub mod router;

pub use config::Config;
pub use datasource::{
    DataSourceError, GraphQlIndexer, HttpUnderlyingResolver, IndexerSource, MockIndexer,
    MockUnderlyingResolver, UnderlyingResolver,
};
pub use domain::{
    ChainId, Permission, Position, PositionId, PositionKey, PositionStatus, PositionVersion, Token,
    TransactionKind, TransactionReceipt, TransactionRecord, TxHash,
};
pub use engine::{Aggregator, IndexerRegistry, Overlay, PositionBook, PositionTracker};
pub use error::{AppError, EngineError};
pub use permissions::{PermissionAuthority, PermissionRegistry, TypedDataSigner};
pub use router::{BackendTxBuilder, ContractProxy, TransactionRouter};
