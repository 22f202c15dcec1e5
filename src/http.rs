//! Shared HTTP client for page fetches, HEAD requests and downloads.

use crate::error::{Error, Result};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, REFERER};
use reqwest::{Client, Proxy, RequestBuilder, Response, Url};
use std::time::Duration;
use tracing::debug;

/// Several vendor servers refuse anything that does not look like a browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/45.0.2454.93 Safari/537.36";

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30));

        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url).map_err(|e| Error::InvalidUrl {
                url: proxy_url.to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|source| Error::Request {
            url: String::new(),
            source,
        })?;

        Ok(Self { client })
    }

    /// Fetch an HTML page as text.
    pub async fn page(&self, url: &Url) -> Result<String> {
        debug!(%url, "Fetching page");
        let response = send(url, self.client.get(url.clone())).await?;
        response.text().await.map_err(|source| Error::Request {
            url: url.to_string(),
            source,
        })
    }

    /// Header-only request, used to learn the final name and size of a file.
    pub async fn head(&self, url: &Url, referer: Option<&Url>) -> Result<Response> {
        send(url, with_referer(self.client.head(url.clone()), referer)).await
    }

    /// Start a download; the body is left unread for the caller to stream.
    pub async fn get(&self, url: &Url, referer: Option<&Url>) -> Result<Response> {
        send(url, with_referer(self.client.get(url.clone()), referer)).await
    }
}

fn with_referer(request: RequestBuilder, referer: Option<&Url>) -> RequestBuilder {
    match referer {
        Some(referer) => request.header(REFERER, referer.as_str()),
        None => request,
    }
}

async fn send(url: &Url, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(|source| Error::Request {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status,
            headers: response.headers().clone(),
        });
    }

    Ok(response)
}

/// The advertised body size. Read from the raw header because HEAD
/// responses carry no body to measure.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
