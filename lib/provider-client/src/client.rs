//! HTTP client for the Scaleway APIs

use provider_api::Paginated;
use provider_core::config::parse_duration;
use provider_core::{ProviderError, Result, VendorError};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Items requested per page by the list aggregator
const PAGE_SIZE: u32 = 100;

/// Connection settings of the vendor client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub access_key: Option<String>,
    pub secret_key: String,
    pub http_timeout: Duration,
}

impl ClientConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_key: None,
            secret_key: secret_key.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Read `SCW_API_URL`, `SCW_ACCESS_KEY`, `SCW_SECRET_KEY` and
    /// `SCW_HTTP_TIMEOUT`. The secret key is required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = lookup("SCW_SECRET_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::invalid_attribute("SCW_SECRET_KEY", "must be set"))?;
        let mut config = ClientConfig::new(secret_key);
        if let Some(url) = lookup("SCW_API_URL").filter(|v| !v.is_empty()) {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        config.access_key = lookup("SCW_ACCESS_KEY").filter(|v| !v.is_empty());
        if let Some(timeout) = lookup("SCW_HTTP_TIMEOUT").filter(|v| !v.is_empty()) {
            config.http_timeout = parse_duration(&timeout)?;
        }
        Ok(config)
    }
}

/// ScwClient sends authenticated requests and maps vendor errors
#[derive(Clone)]
pub struct ScwClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl ScwClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("provider-plugin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Internal(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .header("X-Auth-Token", &self.secret_key)
    }

    async fn send(&self, method: Method, path: &str, builder: RequestBuilder) -> Result<String> {
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        debug!(%method, path, status = status.as_u16(), "Vendor call");
        if status.is_success() {
            Ok(body)
        } else {
            Err(VendorError::from_body(status.as_u16(), &body).into())
        }
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
        Ok(serde_json::from_str(body)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send(Method::GET, path, self.request(Method::GET, path)).await?;
        Self::decode(&body)
    }

    pub async fn get_query<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let builder = self.request(Method::GET, path).query(query);
        let body = self.send(Method::GET, path, builder).await?;
        Self::decode(&body)
    }

    /// GET returning the raw body, for file downloads.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        self.send(Method::GET, path, self.request(Method::GET, path)).await
    }

    /// GET an absolute URL outside the API, without credentials.
    pub async fn fetch_public(&self, url: &str) -> Result<String> {
        self.send(Method::GET, url, self.http.get(url)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let builder = self.request(Method::POST, path).json(body);
        let body = self.send(Method::POST, path, builder).await?;
        Self::decode(&body)
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let builder = self.request(Method::PATCH, path).json(body);
        let body = self.send(Method::PATCH, path, builder).await?;
        Self::decode(&body)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let builder = self.request(Method::PUT, path).json(body);
        let body = self.send(Method::PUT, path, builder).await?;
        Self::decode(&body)
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        let builder = self.request(Method::DELETE, path).query(query);
        self.send(Method::DELETE, path, builder).await?;
        Ok(())
    }

    /// Fetch every page of a list endpoint.
    pub async fn list_all<R: Paginated>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<R::Item>> {
        collect_pages(|page| {
            let mut query: Vec<(&str, String)> = query.to_vec();
            query.push(("page", page.to_string()));
            query.push(("per_page", PAGE_SIZE.to_string()));
            async move { self.get_query::<R>(path, &query).await }
        })
        .await
    }
}

/// Page through a list endpoint until `total_count` items are collected or
/// a page comes back empty.
pub async fn collect_pages<R, F, Fut>(mut fetch: F) -> Result<Vec<R::Item>>
where
    R: Paginated,
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let response = fetch(page).await?;
        let total = response.total_count();
        let batch = response.into_items();
        if batch.is_empty() {
            break;
        }
        items.extend(batch);
        if items.len() as u64 >= total {
            break;
        }
        page += 1;
    }
    Ok(items)
}

/// Query pairs for optional list filters
pub(crate) fn filters(pairs: &[(&'static str, Option<&str>)]) -> Vec<(&'static str, String)> {
    pairs
        .iter()
        .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (*k, v.to_string())))
        .collect()
}
