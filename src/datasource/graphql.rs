//! GraphQL indexing endpoint client.

use super::http::post_json;
use super::{DataSourceError, IndexerPosition, IndexerSource, PositionQuery};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const POSITIONS_QUERY: &str = r#"
query getPositions($address: String!, $status: [String!], $first: Int, $skip: Int) {
  positions(
    where: { user: $address, status_in: $status }
    first: $first
    skip: $skip
    orderBy: createdAtTimestamp
    orderDirection: desc
  ) {
    id
    user
    status
    createdAtTimestamp
    rate
    remainingLiquidity
    remainingSwaps
    toWithdraw
    totalDeposited
    totalSwapped
    totalWithdrawn
    totalSwaps
    totalExecutedSwaps
    depositedRateUnderlying
    totalSwappedUnderlyingAccum
    toWithdrawUnderlyingAccum
    swapInterval { interval }
    from { ...tokenFields underlyingTokens { ...tokenFields } }
    to { ...tokenFields underlyingTokens { ...tokenFields } }
    pair { lastSwappedAt nextSwapAvailableAt }
    permissions { operator permissions }
  }
}

fragment tokenFields on Token {
  address
  decimals
  symbol
  name
  type
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PositionsData {
    positions: Vec<IndexerPosition>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PositionsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// One chain × version indexing endpoint reached over HTTP.
#[derive(Debug, Clone)]
pub struct GraphQlIndexer {
    client: Client,
    url: String,
}

impl GraphQlIndexer {
    pub fn new(url: String) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: String) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn request_body(query: &PositionQuery, first: usize, skip: usize) -> serde_json::Value {
    serde_json::json!({
        "query": POSITIONS_QUERY,
        "variables": {
            "address": query.address,
            "status": query.status_tags(),
            "first": first,
            "skip": skip,
        }
    })
}

fn parse_response(body: serde_json::Value) -> Result<Vec<IndexerPosition>, DataSourceError> {
    let response: GraphQlResponse =
        serde_json::from_value(body).map_err(|e| DataSourceError::ParseError(e.to_string()))?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(DataSourceError::Other(messages.join("; ")));
    }

    response
        .data
        .map(|d| d.positions)
        .ok_or_else(|| DataSourceError::ParseError("Missing data field".to_string()))
}

#[async_trait]
impl IndexerSource for GraphQlIndexer {
    async fn fetch_positions(
        &self,
        query: &PositionQuery,
        first: usize,
        skip: usize,
    ) -> Result<Vec<IndexerPosition>, DataSourceError> {
        debug!(
            "Fetching positions url={}, address={}, status={:?}, first={}, skip={}",
            self.url,
            query.address,
            query.status_tags(),
            first,
            skip
        );

        let body = post_json(&self.client, &self.url, &request_body(query, first, skip)).await?;
        parse_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionStatus;

    #[test]
    fn test_request_body_variables() {
        let query = PositionQuery {
            address: "0xabc".to_string(),
            statuses: vec![PositionStatus::Terminated],
        };
        let body = request_body(&query, 1000, 2000);
        assert_eq!(body["variables"]["address"], "0xabc");
        assert_eq!(body["variables"]["status"], serde_json::json!(["TERMINATED"]));
        assert_eq!(body["variables"]["first"], 1000);
        assert_eq!(body["variables"]["skip"], 2000);
        assert!(body["query"].as_str().unwrap().contains("positions("));
    }

    #[test]
    fn test_parse_response_surfaces_graphql_errors() {
        let body = serde_json::json!({
            "data": null,
            "errors": [{ "message": "indexer behind" }, { "message": "try later" }]
        });
        match parse_response(body) {
            Err(DataSourceError::Other(msg)) => assert_eq!(msg, "indexer behind; try later"),
            other => panic!("Expected Other error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_empty_page() {
        let body = serde_json::json!({ "data": { "positions": [] } });
        assert!(parse_response(body).unwrap().is_empty());
    }
}
