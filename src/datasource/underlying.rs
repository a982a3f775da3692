//! Backend client translating wrapped amounts into underlying amounts.

use super::http::post_json;
use super::{DataSourceError, UnderlyingAmount, UnderlyingRequest, UnderlyingResolver};
use crate::domain::{lowercase_address, parse_u256};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpUnderlyingResolver {
    client: Client,
    base_url: String,
}

impl HttpUnderlyingResolver {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/transforms/to-underlying",
            self.base_url.trim_end_matches('/')
        )
    }
}

fn request_body(requests: &[UnderlyingRequest]) -> serde_json::Value {
    let tokens: Vec<serde_json::Value> = requests
        .iter()
        .map(|r| {
            serde_json::json!({
                "chainId": r.chain_id.as_u64(),
                "token": lowercase_address(&r.token.address),
                "amount": r.amount.to_string(),
            })
        })
        .collect();
    serde_json::json!({ "tokens": tokens })
}

fn parse_response(
    body: &serde_json::Value,
) -> Result<HashMap<String, UnderlyingAmount>, DataSourceError> {
    let entries = body
        .get("underlying")
        .and_then(|v| v.as_object())
        .ok_or_else(|| DataSourceError::ParseError("Missing underlying field".to_string()))?;

    let mut out = HashMap::with_capacity(entries.len());
    for (key, entry) in entries {
        let parsed = entry
            .get("underlyingAmount")
            .and_then(|v| v.as_str())
            .map(parse_u256);
        match parsed {
            Some(Ok(underlying_amount)) => {
                out.insert(key.to_lowercase(), UnderlyingAmount { underlying_amount });
            }
            _ => warn!("Skipping malformed underlying entry {}: {}", key, entry),
        }
    }
    Ok(out)
}

#[async_trait]
impl UnderlyingResolver for HttpUnderlyingResolver {
    async fn resolve(
        &self,
        requests: &[UnderlyingRequest],
    ) -> Result<HashMap<String, UnderlyingAmount>, DataSourceError> {
        debug!("Resolving {} underlying amounts", requests.len());
        let body = post_json(&self.client, &self.endpoint(), &request_body(requests)).await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainId, Token, TokenKind};
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_request_body_uses_decimal_amounts() {
        let token = Token::new(ChainId(137), Address::repeat_byte(0x11), 6, "USDC", TokenKind::Base);
        let body = request_body(&[UnderlyingRequest {
            chain_id: ChainId(137),
            token,
            amount: U256::from(2500u64),
        }]);
        assert_eq!(body["tokens"][0]["chainId"], 137);
        assert_eq!(body["tokens"][0]["amount"], "2500");
        assert_eq!(
            body["tokens"][0]["token"],
            "0x1111111111111111111111111111111111111111"
        );
    }

    #[test]
    fn test_parse_response_skips_malformed_entries() {
        let body = serde_json::json!({
            "underlying": {
                "137-0x11-2500": { "underlyingAmount": "2600" },
                "137-0x22-1": { "underlyingAmount": 7 }
            }
        });
        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(
            parsed["137-0x11-2500"].underlying_amount,
            U256::from(2600u64)
        );
    }

    #[test]
    fn test_parse_response_requires_underlying_field() {
        let body = serde_json::json!({ "other": {} });
        assert!(matches!(
            parse_response(&body),
            Err(DataSourceError::ParseError(_))
        ));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let resolver = HttpUnderlyingResolver::new("https://api.example/".to_string());
        assert_eq!(
            resolver.endpoint(),
            "https://api.example/v1/transforms/to-underlying"
        );
    }
}
