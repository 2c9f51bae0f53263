use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct BackendConfig {
    #[serde(default = "default_address")]
    pub address: Url,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout: default_request_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl BackendConfig {
    pub fn with_address(address: Url) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

fn default_address() -> Url {
    Url::parse("http://localhost:8000").expect("static url is valid")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}
