//! History node client with rate limiting, retries, and provider failover.

use crate::chain::cache::{Cache, CacheError};
use crate::chain::provider::Provider;
use crate::tx::{normalize_transaction, NormalizedTransaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const RATE_LIMIT_MS: u64 = 200;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
    pub offline: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: RATE_LIMIT_MS,
            max_retries: MAX_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            timeout_secs: REQUEST_TIMEOUT_SECS,
            offline: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cache: {0}")]
    Cache(#[from] CacheError),
    #[error("body is not json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("offline mode: no cached data for key")]
    OfflineMiss,
    #[error("no providers configured")]
    NoProviders,
    #[error("all providers failed; last: {0}")]
    ProvidersExhausted(Box<FetchError>),
}

/// Client over one or more history node providers, tried in order. Performs
/// the HTTP I/O the provider descriptors only describe: timeouts, retries
/// with backoff, rate limiting, and optional SQLite caching.
pub struct Fetcher {
    config: FetchConfig,
    providers: Vec<Provider>,
    client: Option<reqwest::Client>,
    cache: Option<Cache>,
    last_request: std::sync::Mutex<Option<OffsetDateTime>>,
    request_count: AtomicU64,
}

impl Fetcher {
    pub fn new(
        config: FetchConfig,
        providers: Vec<Provider>,
        cache: Option<Cache>,
    ) -> Result<Self, FetchError> {
        let client = if config.offline {
            None
        } else {
            Some(
                reqwest::Client::builder()
                    .use_rustls_tls()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()?,
            )
        };
        Ok(Self {
            config,
            providers,
            client,
            cache,
            last_request: std::sync::Mutex::new(None),
            request_count: AtomicU64::new(0),
        })
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    async fn rate_limit(&self) {
        let sleep_ms = {
            let prev = *self.last_request.lock().unwrap();
            match prev {
                Some(prev) => {
                    let elapsed = (OffsetDateTime::now_utc() - prev).whole_milliseconds();
                    let need = i128::from(self.config.rate_limit_ms);
                    if elapsed < need {
                        (need - elapsed).max(0) as u64
                    } else {
                        0
                    }
                }
                None => 0,
            }
        };
        if sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
        *self.last_request.lock().unwrap() = Some(OffsetDateTime::now_utc());
    }

    async fn post_json(
        &self,
        url: url::Url,
        body: &serde_json::Value,
    ) -> Result<String, FetchError> {
        let client = self.client.as_ref().ok_or(FetchError::OfflineMiss)?;
        self.rate_limit().await;

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            match client.post(url.clone()).json(body).send().await {
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    if !status.is_success() {
                        last_err = Some(FetchError::Api(status.as_u16(), text));
                        if attempt < self.config.max_retries {
                            let ms = self.config.retry_backoff_ms * (1 << attempt);
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                        }
                        continue;
                    }
                    self.request_count.fetch_add(1, Ordering::Relaxed);
                    return Ok(text);
                }
                Err(e) => {
                    last_err = Some(FetchError::Request(e));
                    if attempt < self.config.max_retries {
                        let ms = self.config.retry_backoff_ms * (1 << attempt);
                        warn!(attempt, ms, "retry after error");
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(FetchError::Api(0, "unknown".to_string())))
    }

    /// GET the provider's reachability URL; a success status means reachable.
    pub async fn check_reachability(&self, provider: &Provider) -> bool {
        let Some(client) = self.client.as_ref() else {
            return false;
        };
        match client.get(provider.reachability_url()).send().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!(provider = provider.display_name(), error = %e, "probe failed");
                false
            }
        }
    }

    /// Fetch the raw `get_transaction` body for `tx_hash` from one provider.
    /// Answers from cache when possible; offline mode answers only from cache.
    pub async fn get_transaction_raw(
        &self,
        provider: &Provider,
        tx_hash: &str,
    ) -> Result<serde_json::Value, FetchError> {
        let req = provider.get_transaction_request(tx_hash);
        let cache_key = Cache::key_for(&serde_json::to_string(&req.body)?);

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_response(&cache_key)? {
                debug!(key = %cache_key, "cache hit");
                return Ok(serde_json::from_str(&cached)?);
            }
            if self.config.offline {
                return Err(FetchError::OfflineMiss);
            }
        }

        let body = self.post_json(req.url, &req.body).await?;
        if let Some(cache) = &self.cache {
            let _ = cache.put_response(&cache_key, provider.display_name(), &body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Look up `tx_hash` and normalize the response for `account`, failing
    /// over across the configured providers in order. The first provider
    /// whose fetch succeeds wins; when all fail the last error is surfaced.
    pub async fn lookup(
        &self,
        tx_hash: &str,
        account: &str,
    ) -> Result<NormalizedTransaction, FetchError> {
        if self.providers.is_empty() {
            return Err(FetchError::NoProviders);
        }
        let mut last_err = None;
        for provider in &self.providers {
            match self.get_transaction_raw(provider, tx_hash).await {
                Ok(raw) => {
                    info!(provider = provider.display_name(), tx = tx_hash, "fetched");
                    return Ok(normalize_transaction(&raw, account));
                }
                Err(e) => {
                    warn!(provider = provider.display_name(), error = %e, "provider failed");
                    last_err = Some(e);
                }
            }
        }
        Err(FetchError::ProvidersExhausted(Box::new(
            last_err.unwrap_or(FetchError::NoProviders),
        )))
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn offline_config() -> FetchConfig {
        FetchConfig {
            offline: true,
            ..FetchConfig::default()
        }
    }

    #[test]
    fn lookup_without_providers_fails() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fetcher = Fetcher::new(offline_config(), vec![], None).unwrap();
        let err = rt.block_on(fetcher.lookup("abc", "alice")).unwrap_err();
        assert!(matches!(err, FetchError::NoProviders));
    }

    #[test]
    fn offline_cold_cache_exhausts_providers() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let tmp = NamedTempFile::new().unwrap();
        let cache = Cache::open(tmp.path()).unwrap();
        let fetcher = Fetcher::new(offline_config(), Provider::defaults(), Some(cache)).unwrap();
        let err = rt.block_on(fetcher.lookup("abc", "alice")).unwrap_err();
        match err {
            FetchError::ProvidersExhausted(last) => {
                assert!(matches!(*last, FetchError::OfflineMiss));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn offline_lookup_answers_from_cache() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let tmp = NamedTempFile::new().unwrap();
        let cache = Cache::open(tmp.path()).unwrap();

        let provider = Provider::eosinfra();
        let req = provider.get_transaction_request("abc");
        let key = Cache::key_for(&serde_json::to_string(&req.body).unwrap());
        let body = r#"{
            "id": "abc",
            "traces": [{
                "act": {
                    "name": "transfer",
                    "account": "eosio.token",
                    "data": {"from": "bob", "to": "alice", "quantity": "1.0000 EOS", "memo": "hi"}
                },
                "receipt": {"receiver": "alice"}
            }]
        }"#;
        cache.put_response(&key, "eosinfra", body).unwrap();

        let fetcher = Fetcher::new(offline_config(), vec![provider], Some(cache)).unwrap();
        let tx = rt.block_on(fetcher.lookup("abc", "alice")).unwrap();
        assert_eq!(tx.tx_id.as_deref(), Some("abc"));
        assert_eq!(tx.from.as_deref(), Some("bob"));
        assert_eq!(tx.quantity.as_deref(), Some("1.0000 EOS"));
        // Cache hits bypass HTTP entirely.
        assert_eq!(fetcher.request_count(), 0);
    }

    #[test]
    fn offline_probe_is_unreachable() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fetcher = Fetcher::new(offline_config(), Provider::defaults(), None).unwrap();
        assert!(!rt.block_on(fetcher.check_reachability(&Provider::eosinfra())));
    }

    #[test]
    fn config_defaults() {
        let c = FetchConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.rate_limit_ms, 200);
        assert!(!c.offline);
    }
}
