//! Backend API client that builds companion transactions.

use super::{BackendTxBuilder, BackendTxRequest, ContractCall, UnsignedTx};
use crate::datasource::http::post_json;
use crate::datasource::DataSourceError;
use crate::domain::{lowercase_address, parse_u256, PositionPermission};
use crate::permissions::PermissionGrant;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpBackendTxBuilder {
    client: Client,
    base_url: String,
}

impl HttpBackendTxBuilder {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, request: &BackendTxRequest) -> String {
        format!(
            "{}/v1/dca/networks/{}/actions/{}",
            self.base_url.trim_end_matches('/'),
            request.chain_id,
            request.call.action()
        )
    }
}

fn permissions_json(permissions: &[PositionPermission]) -> Value {
    Value::Array(
        permissions
            .iter()
            .map(|p| {
                json!({
                    "operator": lowercase_address(&p.operator),
                    "permissions": p.permissions.iter().map(|x| x.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn permit_json(grant: &PermissionGrant) -> Value {
    json!({
        "tokenId": grant.token_id.to_string(),
        "permissions": [{
            "operator": lowercase_address(&grant.operator),
            "permissions": grant.permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        }],
        "deadline": grant.deadline.to_string(),
        "v": grant.signature.v,
        "r": grant.signature.r.to_string(),
        "s": grant.signature.s.to_string(),
    })
}

fn call_json(call: &ContractCall) -> Value {
    match call {
        ContractCall::Deposit {
            from,
            to,
            amount,
            swaps,
            swap_interval,
            owner,
            permissions,
        } => json!({
            "from": lowercase_address(from),
            "to": lowercase_address(to),
            "amount": amount.to_string(),
            "amountOfSwaps": swaps,
            "swapInterval": swap_interval,
            "owner": lowercase_address(owner),
            "permissions": permissions_json(permissions),
        }),
        ContractCall::IncreasePosition {
            position_id,
            amount,
            new_swaps,
        } => json!({
            "positionId": position_id.to_string(),
            "amount": amount.to_string(),
            "amountOfSwaps": new_swaps,
        }),
        ContractCall::ReducePosition {
            position_id,
            amount,
            new_swaps,
            recipient,
        } => json!({
            "positionId": position_id.to_string(),
            "amount": amount.to_string(),
            "amountOfSwaps": new_swaps,
            "recipient": lowercase_address(recipient),
        }),
        ContractCall::Withdraw {
            position_id,
            recipient,
        }
        | ContractCall::Terminate {
            position_id,
            recipient,
        } => json!({
            "positionId": position_id.to_string(),
            "recipient": lowercase_address(recipient),
        }),
        ContractCall::TerminateMany {
            hub,
            position_ids,
            recipient,
        } => json!({
            "hub": lowercase_address(hub),
            "positionIds": position_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            "recipient": lowercase_address(recipient),
        }),
        ContractCall::ModifyPermissionsMany {
            position_ids,
            permissions,
        } => json!({
            "positionIds": position_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            "permissions": permissions_json(permissions),
        }),
    }
}

fn request_body(request: &BackendTxRequest) -> Value {
    json!({
        "companion": lowercase_address(&request.companion),
        "useNative": request.use_native,
        "call": call_json(&request.call),
        "permits": request.permits.iter().map(permit_json).collect::<Vec<_>>(),
    })
}

fn parse_response(
    body: &Value,
    request: &BackendTxRequest,
) -> Result<UnsignedTx, DataSourceError> {
    let tx = body
        .get("tx")
        .ok_or_else(|| DataSourceError::ParseError("Missing tx field".to_string()))?;
    let field = |name: &str| {
        tx.get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| DataSourceError::ParseError(format!("Missing tx.{}", name)))
    };

    let to = field("to")?
        .parse::<Address>()
        .map_err(|e| DataSourceError::ParseError(format!("Invalid tx.to: {}", e)))?;
    let data = hex::decode(field("data")?.trim_start_matches("0x"))
        .map_err(|e| DataSourceError::ParseError(format!("Invalid tx.data: {}", e)))?;
    let value = match tx.get("value").and_then(|v| v.as_str()) {
        Some(v) => parse_u256(v).map_err(|e| DataSourceError::ParseError(e.to_string()))?,
        None => alloy::primitives::U256::ZERO,
    };

    Ok(UnsignedTx {
        chain_id: request.chain_id,
        to,
        data: Bytes::from(data),
        value,
    })
}

#[async_trait]
impl BackendTxBuilder for HttpBackendTxBuilder {
    async fn build(&self, request: &BackendTxRequest) -> Result<UnsignedTx, DataSourceError> {
        let url = self.endpoint(request);
        debug!(
            "Building {} via backend url={}, permits={}",
            request.call.action(),
            url,
            request.permits.len()
        );
        let body = post_json(&self.client, &url, &request_body(request)).await?;
        parse_response(&body, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainId, PositionId};
    use alloy::primitives::U256;

    fn withdraw_request() -> BackendTxRequest {
        BackendTxRequest {
            chain_id: ChainId(137),
            companion: Address::repeat_byte(0xcc),
            call: ContractCall::Withdraw {
                position_id: PositionId::from(12u64),
                recipient: Address::repeat_byte(0x01),
            },
            use_native: true,
            permits: vec![],
        }
    }

    #[test]
    fn test_endpoint_includes_chain_and_action() {
        let builder = HttpBackendTxBuilder::new("https://api.example/".to_string());
        assert_eq!(
            builder.endpoint(&withdraw_request()),
            "https://api.example/v1/dca/networks/137/actions/withdraw"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body(&withdraw_request());
        assert_eq!(body["useNative"], true);
        assert_eq!(body["call"]["positionId"], "12");
        assert_eq!(body["permits"], json!([]));
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "tx": {
                "to": "0x4242424242424242424242424242424242424242",
                "data": "0xabcd",
                "value": "1000"
            }
        });
        let tx = parse_response(&body, &withdraw_request()).unwrap();
        assert_eq!(tx.to, Address::repeat_byte(0x42));
        assert_eq!(tx.data, Bytes::from(vec![0xab, 0xcd]));
        assert_eq!(tx.value, U256::from(1000u64));
        assert_eq!(tx.chain_id, ChainId(137));
    }

    #[test]
    fn test_parse_response_missing_tx() {
        assert!(matches!(
            parse_response(&json!({}), &withdraw_request()),
            Err(DataSourceError::ParseError(_))
        ));
    }
}
