//! Reference-resource fetching.
//!
//! The fetch collaborator deliberately degrades instead of failing: a
//! transport error or non-success status yields empty text, which the
//! validation support layer treats as "nothing to add". Engines therefore
//! proceed with reduced context rather than aborting a whole session because
//! one terminology server was unreachable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::Result;

/// Configuration for the HTTP resource fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetches reference resources (profiles, structure definitions, code
/// systems, value sets) by URL.
///
/// The HTTP implementation never fails - it degrades to empty text. The
/// contract still allows an error so that a misbehaving fetcher surfaces
/// through the local engine's FATAL containment instead of panicking.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the document at `url`; empty text means "nothing to add".
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed fetcher used outside of tests.
pub struct HttpResourceFetcher {
    client: Client,
}

impl HttpResourceFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(url, %error, "resource fetch failed, continuing with empty content");
                return Ok(String::new());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(
                url,
                status = status.as_u16(),
                "resource fetch returned non-success status, continuing with empty content"
            );
            return Ok(String::new());
        }

        match response.text().await {
            Ok(body) => {
                debug!(url, bytes = body.len(), "fetched reference resource");
                Ok(body)
            }
            Err(error) => {
                warn!(url, %error, "resource body read failed, continuing with empty content");
                Ok(String::new())
            }
        }
    }
}
