use crate::datasource::DataSourceError;
use crate::domain::{AmountError, ChainId, PositionKey, PositionVersion, TxHash};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the position engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One indexing endpoint failed. Absorbed by the aggregator.
    #[error("indexing source v{version} on chain {chain_id} unavailable: {reason}")]
    SourceUnavailable {
        version: PositionVersion,
        chain_id: ChainId,
        reason: String,
    },
    /// The resolver answered without an entry we asked for. Absorbed by the aggregator.
    #[error("underlying resolver has no entry for {0}")]
    ResolverEntryMissing(String),
    #[error("swap count {0} is outside the protocol range")]
    InvalidSwapCount(u64),
    #[error("protocol token mismatch: {0}")]
    ProtocolTokenMismatch(String),
    #[error("permission signature declined by user")]
    PermissionSignatureDeclined,
    #[error("bulk operation spans chain {} v{} and chain {} v{}", .first.0, .first.1, .second.0, .second.1)]
    InconsistentChainSet {
        first: (ChainId, PositionVersion),
        second: (ChainId, PositionVersion),
    },
    #[error("underlying resolution failed: {0}")]
    UnderlyingResolutionFailure(String),
    #[error(transparent)]
    Remote(#[from] DataSourceError),
    #[error("position {0} not found")]
    PositionNotFound(PositionKey),
    #[error("position {key} already has pending transaction {pending}")]
    PendingConflict { key: PositionKey, pending: TxHash },
    #[error("position {0} has no on-chain id yet")]
    NotOnchain(PositionKey),
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),
    #[error("confirmation is missing {0}")]
    MissingConfirmationData(&'static str),
    #[error("no contracts configured for chain {chain_id} v{version}")]
    MissingContracts {
        chain_id: ChainId,
        version: PositionVersion,
    },
    #[error("bulk operation needs at least one position")]
    EmptyBulkOperation,
    #[error("signing failed: {0}")]
    Signing(String),
}

impl EngineError {
    /// Soft failures are logged and never returned from a fetch.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            EngineError::SourceUnavailable { .. } | EngineError::ResolverEntryMissing(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidSwapCount(_)
            | EngineError::ProtocolTokenMismatch(_)
            | EngineError::InconsistentChainSet { .. }
            | EngineError::InvalidAmount(_)
            | EngineError::EmptyBulkOperation => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
