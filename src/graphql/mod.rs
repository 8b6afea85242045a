//! Entity lookup against the network's GraphQL indexer
//!
//! Raw GraphQL query strings over reqwest; the response envelope is the
//! only typed part. Lookups are read-side conveniences for resolving
//! `Existing` entity references before planning, cached briefly because
//! the same labels get searched repeatedly while a claim is being edited.

use alloy::primitives::U256;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::{Error, Result};

/// How long a label's search results stay fresh.
const LOOKUP_CACHE_TTL: Duration = Duration::from_secs(60);

/// Maximum matches requested per label.
const LOOKUP_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    errors: Option<Vec<Value>>,
}

/// One entity record matching a label search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMatch {
    pub id: U256,
    pub label: String,
}

/// Label-search client for existing entity records.
pub struct EntityLookupClient {
    client: Client,
    endpoint: String,
    cache: TtlCache<String, Vec<EntityMatch>>,
}

impl EntityLookupClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            cache: TtlCache::new(LOOKUP_CACHE_TTL),
        }
    }

    /// Search entity records whose label matches `label` exactly.
    pub async fn search_entities(&self, label: &str) -> Result<Vec<EntityMatch>> {
        if let Some(cached) = self.cache.get(&label.to_string()) {
            return Ok(cached);
        }

        let query = r#"
            query EntitiesByLabel($label: String!, $first: Int!) {
                entities(where: { label: { _eq: $label } }, limit: $first) {
                    id
                    label
                }
            }
        "#;
        let variables = json!({ "label": label, "first": LOOKUP_LIMIT });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| Error::GraphQL(format!("request failed: {}", e)))?;

        let envelope: GraphQLResponse = response
            .json()
            .await
            .map_err(|e| Error::GraphQL(format!("unparseable response: {}", e)))?;

        let data = extract_data(envelope)?;
        let matches = parse_entities(&data)?;
        self.cache.insert(label.to_string(), matches.clone());
        Ok(matches)
    }
}

fn extract_data(envelope: GraphQLResponse) -> Result<Value> {
    if let Some(errors) = envelope.errors {
        return Err(Error::GraphQL(format!("server errors: {:?}", errors)));
    }
    envelope
        .data
        .ok_or_else(|| Error::GraphQL("no data in response".to_string()))
}

fn parse_entities(data: &Value) -> Result<Vec<EntityMatch>> {
    let entries = data
        .get("entities")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::GraphQL("missing entities field".to_string()))?;

    entries
        .iter()
        .map(|entry| {
            let id = entry
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::GraphQL("entity without id".to_string()))?;
            let id = U256::from_str(id)
                .map_err(|e| Error::GraphQL(format!("bad entity id {}: {}", id, e)))?;
            let label = entry
                .get("label")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(EntityMatch { id, label })
        })
        .collect()
}
