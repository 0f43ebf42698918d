// =============================================================================
// Broker Adapter — HTTP client for the out-of-process broker service
// =============================================================================
//
// The broker exposes account, positions, order submission, and order status
// over JSON. Reads are idempotent and carry a 5 s timeout; order submission
// is not idempotent and gets 10 s. Transport failures map to
// `BrokerError::Unavailable`, the availability kind of the error taxonomy;
// the core never retries, it fails the current operation.
//
// The `Broker` trait is the seam the execution engine is tested through.
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::types::{OrderType, SignalType, TradeStatus};

/// Timeout for account/position reads.
pub const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
/// Timeout for order submission and status polls.
pub const ORDER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("broker returned a malformed response: {0}")]
    Malformed(String),
}

/// GET /account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub cash: f64,
    pub buying_power: f64,
    pub net_liquidation: f64,
}

/// One entry of GET /positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
}

/// POST /orders request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: SignalType,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<f64>,
}

/// POST /orders response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
}

/// GET /orders/{id}/status response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusInfo {
    pub status: TradeStatus,
    pub filled_qty: f64,
    #[serde(default)]
    pub avg_fill_price: Option<f64>,
}

/// Request-response surface of the broker service.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn account(&self) -> Result<AccountSnapshot, BrokerError>;
    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError>;
    async fn order_status(&self, order_id: &str) -> Result<OrderStatusInfo, BrokerError>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

#[derive(Clone)]
pub struct HttpBroker {
    base_url: String,
    read_client: reqwest::Client,
    order_client: reqwest::Client,
}

impl HttpBroker {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let read_client = reqwest::Client::builder()
            .timeout(READ_TIMEOUT)
            .build()
            .expect("failed to build broker read client");
        let order_client = reqwest::Client::builder()
            .timeout(ORDER_TIMEOUT)
            .build()
            .expect("failed to build broker order client");

        debug!(base_url = %base_url, "broker client initialised");

        Self {
            base_url,
            read_client,
            order_client,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        client: &reqwest::Client,
        url: String,
    ) -> Result<T, BrokerError> {
        let resp = client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Unavailable(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BrokerError::Unavailable(format!(
                "GET {url} returned {status}"
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| BrokerError::Malformed(format!("GET {url}: {e}")))
    }
}

#[async_trait]
impl Broker for HttpBroker {
    #[instrument(skip(self), name = "broker::account")]
    async fn account(&self) -> Result<AccountSnapshot, BrokerError> {
        let snapshot: AccountSnapshot =
            Self::get_json(&self.read_client, format!("{}/account", self.base_url)).await?;
        debug!(
            cash = snapshot.cash,
            buying_power = snapshot.buying_power,
            net_liquidation = snapshot.net_liquidation,
            "account snapshot fetched"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self), name = "broker::positions")]
    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let positions: Vec<BrokerPosition> =
            Self::get_json(&self.read_client, format!("{}/positions", self.base_url)).await?;
        debug!(count = positions.len(), "positions fetched");
        Ok(positions)
    }

    #[instrument(skip(self, request), name = "broker::place_order")]
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError> {
        let url = format!("{}/orders", self.base_url);

        debug!(
            symbol = %request.symbol,
            side = %request.side,
            quantity = request.quantity,
            order_type = %request.order_type,
            "submitting order"
        );

        let resp = self
            .order_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BrokerError::Unavailable(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BrokerError::Unavailable(format!(
                "POST {url} returned {status}"
            )));
        }

        let ack: OrderAck = resp
            .json()
            .await
            .map_err(|e| BrokerError::Malformed(format!("POST {url}: {e}")))?;

        debug!(order_id = %ack.order_id, status = %ack.status, "order accepted");
        Ok(ack)
    }

    #[instrument(skip(self), name = "broker::order_status")]
    async fn order_status(&self, order_id: &str) -> Result<OrderStatusInfo, BrokerError> {
        Self::get_json(
            &self.order_client,
            format!("{}/orders/{order_id}/status", self.base_url),
        )
        .await
    }
}

impl std::fmt::Debug for HttpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBroker")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
