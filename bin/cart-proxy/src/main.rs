//! Cart Proxy - Rate-limited JSON-RPC forward proxy.
//!
//! Sits in front of a paid RPC endpoint and applies per-client token-bucket
//! limits so a pool of fetchers cannot burn through the upstream quota.
//! Exposes `POST /` (forwarded), `GET /health`, and `GET /metrics`.
//!
//! Configuration via environment:
//! - `UPSTREAM_URL`  - where JSON-RPC bodies are forwarded (required)
//! - `LISTEN_ADDR`   - bind address, default `0.0.0.0:8545`
//! - `RATE_MODE`     - `per_ip` (default), `global`, or `none`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};

/// JSON-RPC error code for rate exhaustion.
const RATE_LIMIT_CODE: i64 = -32005;

/// How long an idle per-IP bucket is kept.
const IP_BUCKET_TTL: Duration = Duration::from_secs(300);

/// Limiting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateMode {
    PerIp,
    Global,
    None,
}

impl RateMode {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "per_ip" => Some(RateMode::PerIp),
            "global" => Some(RateMode::Global),
            "none" => Some(RateMode::None),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RateMode::PerIp => "per_ip",
            RateMode::Global => "global",
            RateMode::None => "none",
        }
    }
}

/// Proxy configuration.
#[derive(Debug, Clone)]
struct ProxyConfig {
    upstream_url: String,
    listen_addr: SocketAddr,
    mode: RateMode,
    /// Tokens replenished per second
    rate: f64,
    /// Bucket capacity
    burst: f64,
    /// Block waiting for a token instead of rejecting at once
    wait_for_slot: bool,
    /// Cap on the total wait in wait mode
    max_wait: Duration,
    /// Upstream request timeout
    timeout: Duration,
}

impl ProxyConfig {
    fn from_env() -> Result<Self> {
        let upstream_url =
            std::env::var("UPSTREAM_URL").context("UPSTREAM_URL must be set")?;
        let listen_addr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8545".to_string())
            .parse()
            .context("LISTEN_ADDR is not a socket address")?;
        let mode_name = std::env::var("RATE_MODE").unwrap_or_else(|_| "per_ip".to_string());
        let mode = RateMode::parse(&mode_name)
            .with_context(|| format!("Unknown RATE_MODE: {mode_name}"))?;

        Ok(Self {
            upstream_url,
            listen_addr,
            mode,
            rate: 10.0,
            burst: 20.0,
            wait_for_slot: true,
            max_wait: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        })
    }
}

/// Classic token bucket.
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    burst: f64,
}

impl TokenBucket {
    fn new(rate: f64, burst: f64) -> Self {
        Self {
            tokens: burst,
            last_refill: Instant::now(),
            rate,
            burst,
        }
    }

    /// Takes one token, or reports how long until one is available.
    fn try_take(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / self.rate))
        }
    }
}

struct IpBucket {
    bucket: TokenBucket,
    last_access: Instant,
}

#[derive(Default)]
struct Metrics {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rate_limited: AtomicU64,
    waited: AtomicU64,
}

struct ProxyState {
    config: ProxyConfig,
    http: reqwest::Client,
    global: Option<Mutex<TokenBucket>>,
    per_ip: Mutex<HashMap<IpAddr, IpBucket>>,
    metrics: Metrics,
    started: Instant,
}

impl ProxyState {
    fn new(config: ProxyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let global = match config.mode {
            RateMode::Global => Some(Mutex::new(TokenBucket::new(config.rate, config.burst))),
            _ => None,
        };
        Ok(Self {
            config,
            http,
            global,
            per_ip: Mutex::new(HashMap::new()),
            metrics: Metrics::default(),
            started: Instant::now(),
        })
    }

    /// Takes a token for the client, waiting if configured to.
    ///
    /// Returns the retry interval when the request must be rejected.
    async fn acquire(&self, ip: IpAddr) -> Result<(), Duration> {
        if self.config.mode == RateMode::None {
            return Ok(());
        }

        let mut waited = Duration::ZERO;
        loop {
            let result = match self.config.mode {
                RateMode::Global => self
                    .global
                    .as_ref()
                    .map(|bucket| bucket.lock().try_take())
                    .unwrap_or(Ok(())),
                RateMode::PerIp => {
                    let mut buckets = self.per_ip.lock();
                    let entry = buckets.entry(ip).or_insert_with(|| IpBucket {
                        bucket: TokenBucket::new(self.config.rate, self.config.burst),
                        last_access: Instant::now(),
                    });
                    entry.last_access = Instant::now();
                    entry.bucket.try_take()
                }
                RateMode::None => Ok(()),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    if !self.config.wait_for_slot || waited + wait > self.config.max_wait {
                        return Err(wait.max(Duration::from_secs(1)));
                    }
                    self.metrics.waited.fetch_add(1, Ordering::Relaxed);
                    sleep(wait).await;
                    waited += wait;
                }
            }
        }
    }

    fn prune_idle_buckets(&self) {
        let mut buckets = self.per_ip.lock();
        let before = buckets.len();
        buckets.retain(|_, entry| entry.last_access.elapsed() < IP_BUCKET_TTL);
        let removed = before - buckets.len();
        if removed > 0 {
            info!(removed, remaining = buckets.len(), "Pruned idle IP buckets");
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish(),
    )
    .context("Failed to set up logging")?;

    let config = ProxyConfig::from_env()?;
    info!(
        upstream = %config.upstream_url,
        listen = %config.listen_addr,
        mode = config.mode.label(),
        "Starting proxy"
    );

    let state = Arc::new(ProxyState::new(config.clone())?);

    // Periodic cleanup of idle per-IP buckets.
    if state.config.mode == RateMode::PerIp {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                state.prune_idle_buckets();
            }
        });
    }

    let app = Router::new()
        .route("/", post(rpc_handler).options(preflight_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("Failed to bind listen address")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;
    Ok(())
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("retry-after"),
    );
    response
}

async fn preflight_handler() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

async fn health_handler(State(state): State<Arc<ProxyState>>) -> Response {
    let body = json!({
        "status": "ok",
        "mode": state.config.mode.label(),
        "uptime_seconds": state.started.elapsed().as_secs(),
    });
    with_cors(Json(body).into_response())
}

async fn metrics_handler(State(state): State<Arc<ProxyState>>) -> Response {
    let metrics = &state.metrics;
    let body = json!({
        "total_requests": metrics.total.load(Ordering::Relaxed),
        "success_requests": metrics.succeeded.load(Ordering::Relaxed),
        "failed_requests": metrics.failed.load(Ordering::Relaxed),
        "rate_limited": metrics.rate_limited.load(Ordering::Relaxed),
        "waited_requests": metrics.waited.load(Ordering::Relaxed),
        "active_ips": state.per_ip.lock().len(),
        "uptime_seconds": state.started.elapsed().as_secs(),
        "mode": state.config.mode.label(),
    });
    with_cors(Json(body).into_response())
}

async fn rpc_handler(
    State(state): State<Arc<ProxyState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    state.metrics.total.fetch_add(1, Ordering::Relaxed);

    if let Err(retry_after) = state.acquire(peer.ip()).await {
        state.metrics.rate_limited.fetch_add(1, Ordering::Relaxed);
        return with_cors(rate_limit_response(&body, retry_after));
    }

    match state
        .http
        .post(&state.config.upstream_url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.to_vec())
        .send()
        .await
    {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            match upstream.bytes().await {
                Ok(payload) => {
                    state.metrics.succeeded.fetch_add(1, Ordering::Relaxed);
                    let mut response = (status, payload.to_vec()).into_response();
                    response.headers_mut().insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                    with_cors(response)
                }
                Err(err) => upstream_error(&state, err),
            }
        }
        Err(err) => upstream_error(&state, err),
    }
}

fn upstream_error(state: &ProxyState, err: reqwest::Error) -> Response {
    warn!(%err, "Upstream request failed");
    state.metrics.failed.fetch_add(1, Ordering::Relaxed);
    let body = json!({
        "jsonrpc": "2.0",
        "id": serde_json::Value::Null,
        "error": {"code": -32000, "message": format!("upstream error: {err}")},
    });
    with_cors((StatusCode::BAD_GATEWAY, Json(body)).into_response())
}

/// 429 with a Retry-After header and the JSON-RPC error envelope.
fn rate_limit_response(request_body: &[u8], retry_after: Duration) -> Response {
    let id = serde_json::from_slice::<serde_json::Value>(request_body)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .unwrap_or(serde_json::Value::Null);
    let seconds = retry_after.as_secs().max(1);

    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": RATE_LIMIT_CODE,
            "message": format!("rate limited, retry after {seconds} seconds"),
            "data": {"retry_after_seconds": seconds},
        },
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_burst_then_refill() {
        let mut bucket = TokenBucket::new(10.0, 3.0);
        assert!(bucket.try_take().is_ok());
        assert!(bucket.try_take().is_ok());
        assert!(bucket.try_take().is_ok());

        // Exhausted: the wait is bounded by the refill rate.
        let wait = bucket.try_take().unwrap_err();
        assert!(wait <= Duration::from_millis(150));
    }

    #[test]
    fn test_rate_mode_parse() {
        assert_eq!(RateMode::parse("per_ip"), Some(RateMode::PerIp));
        assert_eq!(RateMode::parse("global"), Some(RateMode::Global));
        assert_eq!(RateMode::parse("none"), Some(RateMode::None));
        assert_eq!(RateMode::parse("burst"), None);
    }

    #[test]
    fn test_rate_limit_response_shape() {
        let response = rate_limit_response(br#"{"jsonrpc":"2.0","id":7,"method":"getSlot"}"#, Duration::from_secs(3));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            HeaderValue::from_static("3")
        );
    }
}
