// =============================================================================
// POS REST API Client — product and order snapshot fetches
// =============================================================================
//
// Thin reqwest wrapper over the two snapshot endpoints of the Tudengibaar
// POS backend. A bearer token is attached when one is configured; an absent
// token still attempts the fetch and lets the server decide authorization.
//
// Malformed bodies (non-array JSON) are tolerated and treated as an empty
// snapshot rather than an error — the poll loop discards the tick on real
// transport/status failures only.
// =============================================================================

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::types::{Order, Product};

/// HTTP client for the POS backend snapshot endpoints.
#[derive(Clone)]
pub struct PosClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl PosClient {
    /// Create a new `PosClient`.
    ///
    /// # Arguments
    /// * `base_url` — POS backend base URL, e.g. `http://localhost:8080`.
    /// * `token`    — bearer credential; may be empty.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        let base_url = base_url.into();
        debug!(base_url = %base_url, "PosClient initialised");

        Self {
            base_url,
            token: token.into(),
            client,
        }
    }

    /// GET /api/products/my — the current product snapshot.
    #[instrument(skip(self), name = "pos::get_products")]
    pub async fn get_products(&self) -> Result<Vec<Product>> {
        let products = self.get_list("/api/products/my").await?;
        debug!(count = products.len(), "product snapshot fetched");
        Ok(products)
    }

    /// GET /api/orders/my — the current order snapshot.
    #[instrument(skip(self), name = "pos::get_orders")]
    pub async fn get_orders(&self) -> Result<Vec<Order>> {
        let orders = self.get_list("/api/orders/my").await?;
        debug!(count = orders.len(), "order snapshot fetched");
        Ok(orders)
    }

    /// Fetch `path` and decode the body as a JSON array of `T`.
    ///
    /// Transport errors and non-2xx statuses propagate as errors (the caller
    /// discards the tick). A 2xx body that is not an array, or an array that
    /// fails to decode, degrades to an empty vector with a warning.
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.get(&url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        // Status first: an error body is often not JSON (proxy HTML pages),
        // and the status is the part worth reporting.
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("POS GET {path} returned {status}: {body}");
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response body"))?;

        if !body.is_array() {
            warn!(path, "snapshot response is not an array — treating as empty");
            return Ok(Vec::new());
        }

        match serde_json::from_value::<Vec<T>>(body) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(path, error = %e, "snapshot array failed to decode — treating as empty");
                Ok(Vec::new())
            }
        }
    }
}

impl std::fmt::Debug for PosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}
