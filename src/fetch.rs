use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::error::{Error, Result};

/// A fetched response body, whatever its status.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedResource {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rejects any non-2xx response as a network error.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(Error::Network {
            url: self.url.to_string(),
            status: self.status,
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs one GET. Transport failures are errors; HTTP statuses are not.
    async fn fetch(&self, url: &Url) -> Result<FetchedResource>;
}

/// Fetches and checks the status in one step.
pub async fn fetch_ok(fetcher: &dyn Fetcher, url: &Url) -> Result<FetchedResource> {
    tracing::debug!(%url, "GET");
    let resource = fetcher.fetch(url).await?;
    tracing::debug!(url = %resource.url, status = resource.status, bytes = resource.body.len(), "response");
    resource.ensure_success()
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;
        Ok(Self {
            client,
            user_agent: user_agent.to_owned(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource> {
        let transport = |source| Error::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(transport)?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;

        Ok(FetchedResource {
            url: final_url,
            status,
            body: body.to_vec(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticFetcher;
    use super::*;

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let fetcher = StaticFetcher::default().with("https://example.org/gone", 410, "gone");
        let url = Url::parse("https://example.org/gone").unwrap();

        let err = fetch_ok(&fetcher, &url).await.unwrap_err();
        match err {
            Error::Network { url, status } => {
                assert_eq!(url, "https://example.org/gone");
                assert_eq!(status, 410);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_status_passes_through() {
        let fetcher = StaticFetcher::default().with("https://example.org/ok", 200, "hello");
        let url = Url::parse("https://example.org/ok").unwrap();

        let resource = fetch_ok(&fetcher, &url).await.unwrap();
        assert_eq!(resource.text(), "hello");
        assert_eq!(fetcher.requests(), vec!["https://example.org/ok".to_owned()]);
    }
}
