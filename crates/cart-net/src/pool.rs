//! Round-robin JSON-RPC pool with failover.
//!
//! Each call picks the next endpoint; up to `2 × endpoints` attempts are
//! made. Rate-limit responses advance the shared gate and the attempt is
//! retried after a fixed pause; other transport failures rotate to the
//! next endpoint. JSON-RPC errors from the program are final.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use cart_core::{Address, TxId};
use cart_proto::Transaction;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::limiter::RateGate;
use crate::retry_after::retry_after_from;
use crate::{Ledger, TransportError};

/// JSON-RPC error code for rate exhaustion.
const RATE_LIMIT_CODE: i64 = -32005;

/// Pause between attempts after a rate-limit event.
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

enum Attempt {
    RateLimited(Duration),
    Retryable(TransportError),
    Fatal(TransportError),
}

/// Connection pool over one or more RPC endpoints.
pub struct RpcPool {
    http: reqwest::Client,
    endpoints: Vec<Endpoint>,
    cursor: AtomicUsize,
    request_id: AtomicU64,
    gate: Arc<RateGate>,
}

impl RpcPool {
    /// Creates a pool over the given endpoints, first entry primary.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self::with_gate(endpoints, Arc::new(RateGate::with_defaults()))
    }

    /// Creates a pool sharing an existing rate gate.
    ///
    /// All pools targeting public endpoints in one process should share a
    /// single gate.
    pub fn with_gate(endpoints: Vec<Endpoint>, gate: Arc<RateGate>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
            cursor: AtomicUsize::new(0),
            request_id: AtomicU64::new(1),
            gate,
        }
    }

    /// Returns the endpoints in rotation order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Issues one JSON-RPC call with rotation and back-off.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let max_attempts = self.endpoints.len() * 2;
        let mut last_rate_limit = None;

        for attempt in 0..max_attempts {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
            let endpoint = &self.endpoints[index];

            if endpoint.is_public() {
                self.gate.acquire().await;
            }

            match self.request_once(endpoint, method, &params).await {
                Ok(value) => return Ok(value),
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::RateLimited(retry_after)) => {
                    warn!(%endpoint, attempt, ?retry_after, "Rate limited");
                    if endpoint.is_public() {
                        self.gate.set_retry_after(retry_after);
                    }
                    last_rate_limit = Some(retry_after);
                    sleep(RATE_LIMIT_PAUSE).await;
                }
                Err(Attempt::Retryable(err)) => {
                    warn!(%endpoint, attempt, %err, "Endpoint failed, rotating");
                }
            }
        }

        match last_rate_limit {
            Some(retry_after) => Err(TransportError::RateLimited { retry_after }),
            None => Err(TransportError::AllEndpointsFailed {
                attempts: max_attempts,
            }),
        }
    }

    async fn request_once(
        &self,
        endpoint: &Endpoint,
        method: &str,
        params: &Value,
    ) -> Result<Value, Attempt> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&endpoint.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(TransportError::Http(e)))?;

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let text = response
            .text()
            .await
            .map_err(|e| Attempt::Retryable(TransportError::Http(e)))?;

        if status.as_u16() == 429 {
            return Err(Attempt::RateLimited(retry_after_from(
                retry_after_header.as_deref(),
                &text,
            )));
        }
        if !status.is_success() {
            return Err(Attempt::Retryable(TransportError::InvalidResponse(
                format!("HTTP {status}"),
            )));
        }

        let envelope: Value = serde_json::from_str(&text).map_err(|e| {
            Attempt::Retryable(TransportError::InvalidResponse(e.to_string()))
        })?;

        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if code == RATE_LIMIT_CODE {
                return Err(Attempt::RateLimited(retry_after_from(
                    retry_after_header.as_deref(),
                    &text,
                )));
            }
            return Err(Attempt::Fatal(TransportError::Rpc { code, message }));
        }

        debug!(%endpoint, method, "RPC ok");
        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| {
                Attempt::Retryable(TransportError::InvalidResponse(
                    "missing result field".to_string(),
                ))
            })
    }

    /// Requests an airdrop to an address. Returns the signature string.
    pub async fn request_airdrop(
        &self,
        address: &Address,
        lamports: u64,
    ) -> Result<String, TransportError> {
        let result = self
            .call("requestAirdrop", json!([address.to_hex(), lamports]))
            .await?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| TransportError::InvalidResponse("airdrop signature".to_string()))
    }

    /// Reads an address's balance in lamports.
    pub async fn get_balance(&self, address: &Address) -> Result<u64, TransportError> {
        let result = self
            .call("getBalance", json!([address.to_hex()]))
            .await?;
        result
            .pointer("/value")
            .and_then(Value::as_u64)
            .or_else(|| result.as_u64())
            .ok_or_else(|| TransportError::InvalidResponse("balance value".to_string()))
    }
}

fn decode_account_value(value: &Value) -> Result<Option<Vec<u8>>, TransportError> {
    if value.is_null() {
        return Ok(None);
    }
    let encoded = value
        .pointer("/data/0")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::InvalidResponse("account data".to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| TransportError::InvalidResponse(format!("base64: {e}")))?;
    Ok(Some(bytes))
}

#[async_trait]
impl Ledger for RpcPool {
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, TransportError> {
        let result = self
            .call(
                "getAccountInfo",
                json!([address.to_hex(), {"encoding": "base64"}]),
            )
            .await?;
        let value = result
            .get("value")
            .ok_or_else(|| TransportError::InvalidResponse("account value".to_string()))?;
        decode_account_value(value)
    }

    async fn get_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<Vec<u8>>>, TransportError> {
        let hex_addresses: Vec<String> = addresses.iter().map(Address::to_hex).collect();
        let result = self
            .call(
                "getMultipleAccounts",
                json!([hex_addresses, {"encoding": "base64"}]),
            )
            .await?;
        let values = result
            .pointer("/value")
            .and_then(Value::as_array)
            .ok_or_else(|| TransportError::InvalidResponse("accounts array".to_string()))?;
        values.iter().map(decode_account_value).collect()
    }

    async fn get_slot(&self) -> Result<u64, TransportError> {
        let result = self.call("getSlot", json!([])).await?;
        result
            .as_u64()
            .ok_or_else(|| TransportError::InvalidResponse("slot value".to_string()))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<TxId, TransportError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(tx.encode());
        self.call("sendTransaction", json!([encoded])).await?;
        Ok(tx.tx_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_account_value() {
        let value = json!({
            "data": [base64::engine::general_purpose::STANDARD.encode(b"account bytes"), "base64"],
            "owner": "00",
        });
        assert_eq!(
            decode_account_value(&value).unwrap().unwrap(),
            b"account bytes"
        );

        assert_eq!(decode_account_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_decode_account_value_rejects_garbage() {
        let value = json!({"data": ["not base64!!!", "base64"]});
        assert!(decode_account_value(&value).is_err());

        let value = json!({"weird": true});
        assert!(decode_account_value(&value).is_err());
    }

    #[test]
    fn test_pool_rotation_covers_all_endpoints() {
        let pool = RpcPool::new(vec![
            Endpoint::new("http://a.local"),
            Endpoint::new("http://b.local"),
            Endpoint::new("http://c.local"),
        ]);
        let picks: Vec<usize> = (0..6)
            .map(|_| pool.cursor.fetch_add(1, Ordering::Relaxed) % pool.endpoints.len())
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }
}
