//! History node descriptors for the public EOS `get_transaction` endpoints.

use serde_json::json;
use thiserror::Error;
use url::Url;

const EOSINFRA_BASE_URL: &str = "https://public.eosinfra.io";
const GREYMASS_BASE_URL: &str = "https://eos.greymass.com";
const GET_TRANSACTION_PATH: &str = "/v1/history/get_transaction";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// One history node backend. The known public variants differ only in host
/// and display name, so a single data-driven descriptor covers all of them.
/// Pure description; the fetch layer performs the actual I/O.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provider {
    name: String,
    base_url: Url,
}

/// POST descriptor for one `get_transaction` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetTransactionRequest {
    pub url: Url,
    pub body: serde_json::Value,
}

impl Provider {
    /// Descriptor for a custom history node base URL.
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn eosinfra() -> Self {
        Self {
            name: "eosinfra".to_string(),
            base_url: Url::parse(EOSINFRA_BASE_URL).expect("static url"),
        }
    }

    pub fn greymass() -> Self {
        Self {
            name: "greymass".to_string(),
            base_url: Url::parse(GREYMASS_BASE_URL).expect("static url"),
        }
    }

    /// Built-in providers in failover order.
    pub fn defaults() -> Vec<Self> {
        vec![Self::eosinfra(), Self::greymass()]
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// Liveness probe target: the bare host root. GET/HEAD semantics are the
    /// caller's choice.
    pub fn reachability_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Build the POST descriptor for looking up `tx_hash`.
    pub fn get_transaction_request(&self, tx_hash: &str) -> GetTransactionRequest {
        let mut url = self.base_url.clone();
        url.set_path(GET_TRANSACTION_PATH);
        GetTransactionRequest {
            url,
            body: json!({ "id": tx_hash }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_is_id_hash() {
        for provider in Provider::defaults() {
            let req = provider.get_transaction_request("abc123");
            assert_eq!(req.body, json!({ "id": "abc123" }));
            assert_eq!(req.url.path(), "/v1/history/get_transaction");
        }
    }

    #[test]
    fn variants_differ_only_in_host() {
        let a = Provider::eosinfra().get_transaction_request("deadbeef");
        let b = Provider::greymass().get_transaction_request("deadbeef");
        assert_eq!(a.body, b.body);
        assert_eq!(a.url.path(), b.url.path());
        assert_eq!(a.url.host_str(), Some("public.eosinfra.io"));
        assert_eq!(b.url.host_str(), Some("eos.greymass.com"));
    }

    #[test]
    fn reachability_url_is_host_root() {
        let url = Provider::greymass().reachability_url();
        assert_eq!(url.as_str(), "https://eos.greymass.com/");
    }

    #[test]
    fn failover_order_is_eosinfra_then_greymass() {
        let names: Vec<_> = Provider::defaults()
            .iter()
            .map(|p| p.display_name().to_string())
            .collect();
        assert_eq!(names, ["eosinfra", "greymass"]);
    }

    #[test]
    fn custom_provider_rejects_bad_url() {
        assert!(Provider::new("bad", "not a url").is_err());
        let p = Provider::new("local", "http://localhost:8888").unwrap();
        let req = p.get_transaction_request("ff");
        assert_eq!(
            req.url.as_str(),
            "http://localhost:8888/v1/history/get_transaction"
        );
    }
}
