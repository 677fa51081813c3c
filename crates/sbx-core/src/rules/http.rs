use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, instrument};

use sbx_model::RoutingRulesResponse;

use crate::rules::{RulesError, RulesQuery, RulesSource};

/// Longest response-body excerpt kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

/// Routing-rules source backed by the route server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRulesSource {
    base: Url,
    client: Client,
}

impl HttpRulesSource {
    /// Create a source for the given route-server base address.
    ///
    /// `timeout` bounds each request end to end.
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RulesError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RulesError::from)?;
        Self::with_client(base, client)
    }

    /// Create a source reusing an existing client.
    pub fn with_client(base: &str, client: Client) -> Result<Self, RulesError> {
        let base = parse_base(base)?;
        Ok(Self { base, client })
    }

    /// Route-server base address.
    pub fn base(&self) -> &Url {
        &self.base
    }
}

/// Parse and check a route-server base address.
pub(crate) fn parse_base(addr: &str) -> Result<Url, RulesError> {
    let invalid = |reason: String| RulesError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    };
    let url = Url::parse(addr.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

#[async_trait]
impl RulesSource for HttpRulesSource {
    fn name(&self) -> &'static str {
        "route-server"
    }

    #[instrument(level = "debug", skip(self, query), fields(query = %query))]
    async fn fetch(&self, query: &RulesQuery) -> Result<RoutingRulesResponse, RulesError> {
        let url = query.to_url(&self.base);
        debug!(%url, "requesting routing rules");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let cut = (0..=ERROR_BODY_LIMIT)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(RulesError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice::<RoutingRulesResponse>(&bytes)
            .map_err(|e| RulesError::Malformed(e.to_string()))
    }
}
