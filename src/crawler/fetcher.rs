//! Search page fetcher
//!
//! This module handles the network side of a crawl cycle:
//! - The `PageFetcher` capability the category workers consume
//! - Building the HTTP client (cookie store, compression, optional proxy)
//! - Issuing the GraphQL `searchModel` request for one page
//! - Decoding the response into a `SearchPage`

use crate::config::{CatalogConfig, TransportConfig};
use crate::crawler::product::{RawItem, SearchPage};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Proxy};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// GraphQL document for the search endpoint, limited to the fields the
/// crawler reads
pub const SEARCH_QUERY: &str = r#"query searchModel($keyword: String, $navParam: String, $storefilter: StoreFilter = ALL, $storeId: String, $channel: Channel = DESKTOP, $additionalSearchParams: AdditionalParams, $startIndex: Int, $pageSize: Int, $orderBy: ProductSort, $filter: ProductFilter) {
  searchModel(keyword: $keyword, navParam: $navParam, storefilter: $storefilter, storeId: $storeId, channel: $channel, additionalSearchParams: $additionalSearchParams) {
    id
    searchReport {
      totalProducts
      pageSize
      startIndex
      __typename
    }
    products(startIndex: $startIndex, pageSize: $pageSize, orderBy: $orderBy, filter: $filter) {
      itemId
      identifiers {
        canonicalUrl
        brandName
        itemId
        productLabel
        __typename
      }
      media {
        images {
          url
          __typename
        }
        __typename
      }
      pricing(storeId: $storeId) {
        value
        original
        __typename
      }
      __typename
    }
    __typename
  }
}
"#;

/// Parameters of a single page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub category_id: String,
    pub start_index: u64,
    pub store_id: String,
    pub page_size: u64,
}

/// Capability to fetch one page of a category's search results
///
/// Implementations must be safe for concurrent use by every worker. Any
/// error is treated by the caller as transient.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> FetchResult<SearchPage>;
}

/// Builds an HTTP client for the catalog
///
/// The client keeps cookies between requests, accepts compressed bodies and
/// routes everything through the configured proxy, if any.
pub fn build_http_client(
    config: &TransportConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Page fetcher speaking to the catalog's GraphQL search endpoint
pub struct GraphqlPageFetcher {
    client: Client,
    origin: String,
    endpoint: String,
    warm_up: bool,
    headers: HeaderMap,
}

impl GraphqlPageFetcher {
    /// Creates a fetcher with its own HTTP client
    pub fn new(
        catalog: &CatalogConfig,
        transport: &TransportConfig,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = build_http_client(transport, timeout)
            .map_err(|e| FetchError::Build(e.to_string()))?;
        Self::with_client(client, catalog, transport)
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(
        client: Client,
        catalog: &CatalogConfig,
        transport: &TransportConfig,
    ) -> Result<Self, FetchError> {
        let origin = catalog.origin.trim_end_matches('/').to_string();
        let endpoint = format!("{}{}", origin, catalog.graphql_path);
        let headers = search_headers(&origin, transport.referer.as_deref())?;

        Ok(Self {
            client,
            origin,
            endpoint,
            warm_up: catalog.warm_up,
            headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Loads the home page so the cookie store holds fresh session cookies
    async fn warm_up(&self) -> FetchResult<()> {
        let url = format!("{}/", self.origin);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        // Only the cookies matter; drain the body so the connection is reused
        let _ = response.bytes().await;
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for GraphqlPageFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> FetchResult<SearchPage> {
        if self.warm_up {
            self.warm_up().await?;
        }

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&search_body(request))
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Network {
                url: self.endpoint.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_search_page(&body)
    }
}

/// Builds the JSON request body for one page
pub fn search_body(request: &PageRequest) -> serde_json::Value {
    json!({
        "operationName": "searchModel",
        "variables": {
            "navParam": request.category_id,
            "pageSize": request.page_size,
            "startIndex": request.start_index,
            "storeId": request.store_id,
            "additionalSearchParams": {
                "plp": "true"
            }
        },
        "query": SEARCH_QUERY,
    })
}

fn search_headers(origin: &str, referer: Option<&str>) -> Result<HeaderMap, FetchError> {
    let value = |v: &str| {
        HeaderValue::from_str(v).map_err(|e| FetchError::Build(format!("bad header value {v:?}: {e}")))
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ORIGIN, value(origin)?);
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-experience-name", HeaderValue::from_static("b2b"));
    headers.insert("apollographql-client-name", HeaderValue::from_static("b2b"));
    headers.insert(
        "apollographql-client-version",
        HeaderValue::from_static("0.0.0"),
    );
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    if let Some(referer) = referer {
        headers.insert(header::REFERER, value(referer)?);
    }
    Ok(headers)
}

// ===== Response decoding =====

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphqlMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphqlMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "searchModel")]
    search_model: Option<SearchModel>,
}

#[derive(Debug, Deserialize)]
struct SearchModel {
    #[serde(rename = "searchReport")]
    search_report: Option<SearchReport>,
    #[serde(default)]
    products: Option<Vec<ProductNode>>,
}

#[derive(Debug, Deserialize)]
struct SearchReport {
    #[serde(rename = "totalProducts")]
    total_products: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    #[serde(rename = "itemId")]
    item_id: Option<String>,
    identifiers: Option<Identifiers>,
    media: Option<Media>,
    pricing: Option<Pricing>,
}

#[derive(Debug, Deserialize)]
struct Identifiers {
    #[serde(rename = "canonicalUrl")]
    canonical_url: Option<String>,
    #[serde(rename = "brandName")]
    brand_name: Option<String>,
    #[serde(rename = "productLabel")]
    product_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pricing {
    original: Option<f64>,
}

/// Decodes a `searchModel` response body into a page of items
///
/// Products without an item identifier are skipped. A response without a
/// `searchModel` object is a payload error.
pub fn decode_search_page(body: &str) -> FetchResult<SearchPage> {
    let response: GraphqlResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Payload(e.to_string()))?;

    let model = match response.data.and_then(|d| d.search_model) {
        Some(model) => model,
        None => {
            let reason = response
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "missing data.searchModel".to_string());
            return Err(FetchError::Payload(reason));
        }
    };

    let total_products = model
        .search_report
        .and_then(|r| r.total_products)
        .unwrap_or(0)
        .max(0) as u64;

    let mut items = Vec::new();
    for product in model.products.unwrap_or_default() {
        let Some(item_id) = product.item_id.filter(|id| !id.is_empty()) else {
            tracing::debug!("Skipping product without itemId");
            continue;
        };

        let (name, brand, canonical_url) = match product.identifiers {
            Some(ids) => (
                ids.product_label.unwrap_or_default(),
                ids.brand_name.unwrap_or_default(),
                ids.canonical_url.unwrap_or_default(),
            ),
            None => Default::default(),
        };

        items.push(RawItem {
            item_id,
            name,
            brand,
            canonical_url,
            image_url: product
                .media
                .and_then(|m| m.images)
                .and_then(|images| images.into_iter().next())
                .and_then(|image| image.url),
            original_price: product.pricing.and_then(|p| p.original),
        });
    }

    Ok(SearchPage {
        items,
        total_products,
    })
}
