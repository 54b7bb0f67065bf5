use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use url::Url;

use crate::config::EngineConfig;
use crate::error::DownloadError;

/// Result of a successful fetch: the URL after redirects and the
/// lossily-decoded body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
}

/// Host-bounded HTTP fetcher shared read-only across every worker. Its own
/// client pool serialises TCP/TLS reuse; a per-host semaphore caps
/// concurrent in-flight requests to any one host, since `reqwest` has no
/// native per-host limit (spec.md §9, "Host connection cap").
pub struct Downloader {
    client: reqwest::Client,
    request_timeout: Duration,
    host_connection_limit: usize,
    host_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Downloader {
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(true)
            .gzip(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            host_connection_limit: config.host_connection_limit,
            host_gates: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch `url`, returning the final URL after redirects and the decoded
    /// body. Aborts cleanly (no lingering sockets) if the calling task is
    /// cancelled, since every await point below is a plain future drop.
    pub async fn get(&self, url: &str) -> Result<FetchedPage, DownloadError> {
        let gate = self.host_gate(url).await;
        let _permit = gate.acquire().await.expect("host gate never closed");

        let request = self.client.get(url);

        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| DownloadError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| classify_transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();

        let bytes = tokio::time::timeout(self.request_timeout, response.bytes())
            .await
            .map_err(|_| DownloadError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| classify_transport(url, e))?;

        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(FetchedPage { final_url, body })
    }

    async fn host_gate(&self, url: &str) -> Arc<Semaphore> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let mut gates = self.host_gates.lock().await;
        gates
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.host_connection_limit)))
            .clone()
    }
}

fn classify_transport(url: &str, e: reqwest::Error) -> DownloadError {
    use std::error::Error as StdError;

    if e.is_timeout() {
        return DownloadError::Timeout {
            url: url.to_string(),
        };
    }
    let looks_like_dns = e.is_connect()
        && StdError::source(&e)
            .map(|s| s.to_string().to_lowercase().contains("dns"))
            .unwrap_or(false);
    if looks_like_dns {
        return DownloadError::Dns {
            url: url.to_string(),
            source: anyhow::anyhow!(e),
        };
    }
    DownloadError::Transport {
        url: url.to_string(),
        source: anyhow::anyhow!(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_body_and_reports_final_url() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/page"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let dl = Downloader::new(&EngineConfig::default()).unwrap();
        let page = dl.get(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(page.body, "hello");
        assert!(page.final_url.ends_with("/page"));
    }

    #[tokio::test]
    async fn non_2xx_is_reported_as_http_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dl = Downloader::new(&EngineConfig::default()).unwrap();
        let err = dl
            .get(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        match err {
            DownloadError::Http { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Http error, got {other:?}"),
        }
    }
}
