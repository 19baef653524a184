//! eos_history — EOS transaction lookup over public history nodes.
//!
//! Fetches `/v1/history/get_transaction` from interchangeable providers with
//! in-order failover and local caching, then normalizes the response into a
//! flat best-effort record. Read-only; no keys; no signing.

pub mod chain;
pub mod tx;

pub use chain::{Cache, FetchConfig, FetchError, Fetcher, GetTransactionRequest, Provider};
pub use tx::{normalize_transaction, NormalizedTransaction};
