//! The pooled connection wrapper

use super::config::ConnectionPoolConfig;
use super::stats::{ConnectionPoolStats, StatsInner};
use super::types::{PoolResponse, RequestOptions};
use crate::error::{BulkheadError, BulkheadResult};
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::{Client, Method, Response};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One pooled HTTP client with usage statistics, a periodic background health
/// check, and one-shot reconnect on connection failure
///
/// The pool never inspects request or response content; callers gate their
/// calls through a rate limiter and hand the pool the wire-level work.
#[derive(Debug)]
pub struct ConnectionPool {
    config: ConnectionPoolConfig,
    client: Arc<RwLock<Client>>,
    stats: Arc<Mutex<StatsInner>>,
    shutdown: CancellationToken,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Open the pool: build the pooled client and start the health-check loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ConnectionPoolConfig) -> BulkheadResult<Self> {
        let client = Arc::new(RwLock::new(build_client(&config)?));
        let stats = Arc::new(Mutex::new(StatsInner::default()));
        let shutdown = CancellationToken::new();

        let health_task = tokio::spawn(health_check_loop(
            Arc::downgrade(&client),
            stats.clone(),
            shutdown.clone(),
            config.health_check_interval,
        ));

        debug!(
            "connection pool opened (max {} connections, {} keep-alive)",
            config.max_connections, config.max_keepalive_connections
        );

        Ok(Self {
            config,
            client,
            stats,
            shutdown,
            health_task: Mutex::new(Some(health_task)),
        })
    }

    /// Open the pool with default configuration
    pub fn with_defaults() -> BulkheadResult<Self> {
        Self::new(ConnectionPoolConfig::default())
    }

    /// Get the pool configuration
    pub fn config(&self) -> &ConnectionPoolConfig {
        &self.config
    }

    /// Close the pool: stop the health-check loop and wait for it to finish
    ///
    /// The underlying client is dropped with the pool; in-flight requests on
    /// cloned handles complete normally.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let task = self.health_task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!("health check task ended abnormally: {}", err);
            }
        }
        debug!("connection pool closed");
    }

    /// Issue one request and return the fully-read response
    ///
    /// A connection-establishment or connect-timeout failure triggers exactly
    /// one reconnect and one retry; if the retry fails too, the original
    /// error is what the caller sees. Responses with error status codes are
    /// returned, not raised. Active-connection accounting is released on
    /// every exit path.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> BulkheadResult<PoolResponse> {
        let _active = ActiveGuard::acquire(&self.stats);
        let bytes_sent = options.body_len();
        let start = Instant::now();

        match self.send(method.clone(), url, &options).await {
            Ok(response) => self.read_and_record(response, start, bytes_sent).await,
            Err(err) if err.is_connect() => {
                self.stats.lock().record_failure();
                warn!(
                    "connect failure for {} {}: {}; reconnecting once",
                    method, url, err
                );
                if let Err(reconnect_err) = self.reconnect().await {
                    warn!("reconnect failed: {}", reconnect_err);
                    return Err(err.into());
                }
                match self.send(method, url, &options).await {
                    Ok(response) => self.read_and_record(response, start, bytes_sent).await,
                    Err(retry_err) => {
                        debug!("retry after reconnect also failed: {}", retry_err);
                        // The original failure is the one the caller sees
                        Err(err.into())
                    }
                }
            }
            Err(err) => {
                self.stats.lock().record_failure();
                Err(err.into())
            }
        }
    }

    /// Scoped streaming request
    ///
    /// Hands the in-flight [`reqwest::Response`] to `f`; a clean completion
    /// records success, an error records failure and propagates. Streaming
    /// failures are never auto-retried.
    pub async fn stream<F, Fut, T>(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        f: F,
    ) -> BulkheadResult<T>
    where
        F: FnOnce(Response) -> Fut,
        Fut: Future<Output = BulkheadResult<T>>,
    {
        let _active = ActiveGuard::acquire(&self.stats);
        let bytes_sent = options.body_len();
        let start = Instant::now();

        let response = match self.send(method, url, &options).await {
            Ok(response) => response,
            Err(err) => {
                self.stats.lock().record_failure();
                return Err(err.into());
            }
        };
        // The body is consumed inside `f`; the declared length is the best
        // received-bytes figure available here
        let received_hint = response.content_length().unwrap_or(0);

        match f(response).await {
            Ok(value) => {
                self.stats
                    .lock()
                    .record_success(start.elapsed(), bytes_sent, received_hint);
                Ok(value)
            }
            Err(err) => {
                self.stats.lock().record_failure();
                Err(err)
            }
        }
    }

    /// Replace the underlying client with a freshly built one
    pub async fn reconnect(&self) -> BulkheadResult<()> {
        let new_client = build_client(&self.config)?;
        *self.client.write().await = new_client;
        let reconnections = {
            let mut stats = self.stats.lock();
            stats.reconnections += 1;
            stats.reconnections
        };
        info!("connection pool reconnected (total {})", reconnections);
        Ok(())
    }

    /// Snapshot of the current usage statistics
    pub fn stats(&self) -> ConnectionPoolStats {
        self.stats.lock().snapshot()
    }

    /// Zero all counters and clear the response-time samples
    pub fn reset_stats(&self) {
        self.stats.lock().reset();
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Response, reqwest::Error> {
        // Client clones share the same pool; the lock is only held long
        // enough to grab a handle
        let client = self.client.read().await.clone();

        let mut request = client.request(method, url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(json) = &options.json {
            request = request.json(json);
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        request.send().await
    }

    async fn read_and_record(
        &self,
        response: Response,
        start: Instant,
        bytes_sent: u64,
    ) -> BulkheadResult<PoolResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();

        match response.bytes().await {
            Ok(body) => {
                self.stats
                    .lock()
                    .record_success(start.elapsed(), bytes_sent, body.len() as u64);
                Ok(PoolResponse {
                    status,
                    headers,
                    url,
                    body,
                })
            }
            Err(err) => {
                self.stats.lock().record_failure();
                Err(err.into())
            }
        }
    }
}

/// RAII guard for the total/active request counters
///
/// Decrements active-connections exactly once, whichever way the request
/// scope exits.
struct ActiveGuard {
    stats: Arc<Mutex<StatsInner>>,
}

impl ActiveGuard {
    fn acquire(stats: &Arc<Mutex<StatsInner>>) -> Self {
        {
            let mut inner = stats.lock();
            inner.total_requests += 1;
            inner.active_connections += 1;
        }
        Self {
            stats: stats.clone(),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut inner = self.stats.lock();
        inner.active_connections = inner.active_connections.saturating_sub(1);
    }
}

fn build_client(config: &ConnectionPoolConfig) -> BulkheadResult<Client> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(config.idle_per_host())
        .pool_idle_timeout(config.keepalive_expiry)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);

    if config.http2 {
        builder = builder.http2_prior_knowledge();
    }

    builder
        .build()
        .map_err(|e| BulkheadError::config(format!("failed to build HTTP client: {}", e)))
}

/// Periodic health check: verifies the pool is still alive and stamps the
/// check time. Nothing this loop does may take the pool down with it.
async fn health_check_loop(
    client: Weak<RwLock<Client>>,
    stats: Arc<Mutex<StatsInner>>,
    shutdown: CancellationToken,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; the first real check is one period out
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(client) = client.upgrade() else { break };
                // Holding the read lock confirms the client is not mid-swap
                let _open = client.read().await;
                stats.lock().last_health_check = Some(Utc::now());
                debug!("connection pool health check passed");
            }
        }
    }
    debug!("connection pool health check loop stopped");
}
