//! Connection settings for one store.

use serde::{Deserialize, Serialize};

/// Connection settings for a [`GraphqlStore`](crate::GraphqlStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Label used in logs and error context (e.g. "source", "target").
    pub name: String,
    /// Shop domain, e.g. `example.myshopify.com`.
    pub shop_domain: String,
    /// Admin API access token.
    pub access_token: String,
    /// Admin API version segment of the endpoint path.
    pub api_version: String,
    /// Overrides `https://{shop_domain}`; used to point at a mock server.
    pub api_base_url: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Records requested per page when listing records.
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            shop_domain: String::new(),
            access_token: String::new(),
            api_version: "2025-01".to_string(),
            api_base_url: None,
            timeout_secs: 60,
            page_size: 50,
        }
    }
}

impl StoreConfig {
    /// The GraphQL endpoint URL.
    pub fn endpoint(&self) -> String {
        let base = match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.shop_domain),
        };
        format!("{base}/admin/api/{}/graphql.json", self.api_version)
    }

    /// Checks the settings needed to issue any request.
    pub fn validate(&self) -> Result<(), String> {
        if self.shop_domain.is_empty() && self.api_base_url.is_none() {
            return Err(format!("{}: shop_domain is required", self.name));
        }
        if self.access_token.is_empty() {
            return Err(format!("{}: access_token is required", self.name));
        }
        if self.page_size == 0 || self.page_size > 250 {
            return Err(format!("{}: page_size must be in 1..=250", self.name));
        }
        Ok(())
    }
}
