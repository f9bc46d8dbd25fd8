//! Client for the content-addressed message network.
//!
//! The network owns two things this service touches: dataset posts (read
//! per request, never cached) and the append-only permission channel
//! (write-only). One HTTP client serves both capability traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use payrail::catalog::{DatasetCatalog, PermissionStore};
use payrail::error::PaymentError;
use payrail::types::{Dataset, PermissionRecord};

/// HTTP client for the message network.
#[derive(Debug, Clone)]
pub struct MeshClient {
    http: reqwest::Client,
    base_url: Url,
    channel: String,
}

#[derive(Debug, Deserialize)]
struct PostsPage {
    posts: Vec<DatasetPost>,
}

#[derive(Debug, Deserialize)]
struct DatasetPost {
    content: Dataset,
}

#[derive(Debug, Serialize)]
struct PermissionMessage<'a> {
    channel: &'a str,
    post_type: &'a str,
    content: &'a PermissionRecord,
}

#[derive(Debug, Deserialize)]
struct PublishReceipt {
    item_hash: String,
}

impl MeshClient {
    /// Creates a client against the given API base URL, publishing
    /// permission records to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InputInvalid`] if the base URL is malformed.
    pub fn new(api_server: &str, channel: impl Into<String>) -> Result<Self, PaymentError> {
        let base_url = Url::parse(api_server).map_err(|e| {
            PaymentError::InputInvalid(format!("mesh api server {api_server:?}: {e}"))
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            channel: channel.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.base_url
            .join(path)
            .map_err(|e| PaymentError::Store(format!("mesh url {path}: {e}")))
    }
}

#[async_trait]
impl DatasetCatalog for MeshClient {
    async fn dataset(&self, dataset_id: &str) -> Result<Dataset, PaymentError> {
        let url = self.endpoint("/api/v0/posts.json")?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("types", "Dataset"),
                ("hashes", dataset_id),
                ("pagination", "1"),
                ("page", "1"),
            ])
            .send()
            .await
            .map_err(|e| PaymentError::Store(format!("dataset fetch: {e}")))?
            .error_for_status()
            .map_err(|e| PaymentError::Store(format!("dataset fetch: {e}")))?;
        let page: PostsPage = response
            .json()
            .await
            .map_err(|e| PaymentError::Store(format!("dataset fetch: {e}")))?;
        page.posts
            .into_iter()
            .next()
            .map(|post| post.content)
            .ok_or_else(|| PaymentError::DatasetNotPayable(dataset_id.to_owned()))
    }
}

#[async_trait]
impl PermissionStore for MeshClient {
    async fn publish(&self, record: &PermissionRecord) -> Result<String, PaymentError> {
        let url = self.endpoint("/api/v0/messages")?;
        let message = PermissionMessage {
            channel: &self.channel,
            post_type: "Permission",
            content: record,
        };
        let receipt: PublishReceipt = self
            .http
            .post(url)
            .json(&message)
            .send()
            .await
            .map_err(|e| PaymentError::Store(format!("permission publish: {e}")))?
            .error_for_status()
            .map_err(|e| PaymentError::Store(format!("permission publish: {e}")))?
            .json()
            .await
            .map_err(|e| PaymentError::Store(format!("permission publish: {e}")))?;
        Ok(receipt.item_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrail::types::PermissionStatus;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dataset_json() -> serde_json::Value {
        serde_json::json!({
            "posts": [{
                "content": {
                    "name": "tides",
                    "owner": "SellerWallet",
                    "price": "2.50",
                    "timeseriesIDs": ["a", "b"]
                }
            }]
        })
    }

    #[tokio::test]
    async fn fetches_dataset_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/posts.json"))
            .and(query_param("types", "Dataset"))
            .and(query_param("hashes", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(dataset_json()))
            .mount(&server)
            .await;

        let client = MeshClient::new(&server.uri(), "TEST").unwrap();
        let dataset = client.dataset("abc123").await.unwrap();
        assert_eq!(dataset.name, "tides");
        assert_eq!(dataset.price.as_deref(), Some("2.50"));
        assert_eq!(dataset.timeseries_ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn missing_dataset_is_not_payable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/posts.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "posts": [] })),
            )
            .mount(&server)
            .await;

        let client = MeshClient::new(&server.uri(), "TEST").unwrap();
        let result = client.dataset("missing").await;
        assert!(matches!(result, Err(PaymentError::DatasetNotPayable(_))));
    }

    #[tokio::test]
    async fn publish_returns_item_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "item_hash": "hash-1" })),
            )
            .mount(&server)
            .await;

        let client = MeshClient::new(&server.uri(), "TEST").unwrap();
        let record = PermissionRecord {
            authorizer: "seller".into(),
            requestor: "buyer".into(),
            dataset_id: "d".into(),
            timeseries_id: "t".into(),
            status: PermissionStatus::Granted,
        };
        assert_eq!(client.publish(&record).await.unwrap(), "hash-1");
    }

    #[tokio::test]
    async fn publish_failure_is_a_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/messages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = MeshClient::new(&server.uri(), "TEST").unwrap();
        let record = PermissionRecord {
            authorizer: "seller".into(),
            requestor: "buyer".into(),
            dataset_id: "d".into(),
            timeseries_id: "t".into(),
            status: PermissionStatus::Granted,
        };
        assert!(matches!(
            client.publish(&record).await,
            Err(PaymentError::Store(_))
        ));
    }
}
