//! History node access: provider descriptors, fetching, caching.

mod cache;
mod fetch;
mod provider;

pub use cache::{Cache, CacheError};
pub use fetch::{FetchConfig, FetchError, Fetcher};
pub use provider::{GetTransactionRequest, Provider, ProviderError};
