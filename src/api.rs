use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{ErrorBody, Health, NewTopic, SearchResponse, Topic, TopicPatch};

/// The topic collection endpoints.
#[async_trait]
pub trait TopicApi: Send + Sync {
    async fn list_topics(&self) -> Result<Vec<Topic>, ApiError>;
    async fn create_topic(&self, topic: &NewTopic) -> Result<Topic, ApiError>;
    async fn update_topic(&self, id: i64, patch: &TopicPatch) -> Result<Topic, ApiError>;
    async fn delete_topic(&self, id: i64) -> Result<(), ApiError>;
}

#[async_trait]
pub trait EventApi: Send + Sync {
    async fn search_events(&self, keyword: &str) -> Result<SearchResponse, ApiError>;
}

#[async_trait]
impl<T: TopicApi + ?Sized> TopicApi for std::sync::Arc<T> {
    async fn list_topics(&self) -> Result<Vec<Topic>, ApiError> {
        (**self).list_topics().await
    }

    async fn create_topic(&self, topic: &NewTopic) -> Result<Topic, ApiError> {
        (**self).create_topic(topic).await
    }

    async fn update_topic(&self, id: i64, patch: &TopicPatch) -> Result<Topic, ApiError> {
        (**self).update_topic(id, patch).await
    }

    async fn delete_topic(&self, id: i64) -> Result<(), ApiError> {
        (**self).delete_topic(id).await
    }
}

#[async_trait]
impl<T: EventApi + ?Sized> EventApi for std::sync::Arc<T> {
    async fn search_events(&self, keyword: &str) -> Result<SearchResponse, ApiError> {
        (**self).search_events(keyword).await
    }
}

/// reqwest-backed client for the event search API.
pub struct HttpApi {
    client: Client,
    config: Config,
}

impl HttpApi {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn health(&self) -> Result<Health, ApiError> {
        let url = self.config.endpoint("/health");
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl TopicApi for HttpApi {
    async fn list_topics(&self) -> Result<Vec<Topic>, ApiError> {
        let url = self.config.endpoint("/api/topics");
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    async fn create_topic(&self, topic: &NewTopic) -> Result<Topic, ApiError> {
        let url = self.config.endpoint("/api/topics");
        debug!(%url, keyword = %topic.keyword, "POST");
        let response = self.client.post(url).json(topic).send().await?;
        decode(response).await
    }

    async fn update_topic(&self, id: i64, patch: &TopicPatch) -> Result<Topic, ApiError> {
        let url = self.config.endpoint(&format!("/api/topics/{}", id));
        debug!(%url, ?patch, "PUT");
        let response = self.client.put(url).json(patch).send().await?;
        decode(response).await
    }

    async fn delete_topic(&self, id: i64) -> Result<(), ApiError> {
        let url = self.config.endpoint(&format!("/api/topics/{}", id));
        debug!(%url, "DELETE");
        let response = self.client.delete(url).send().await?;
        check(response).await.map(|_| ())
    }
}

#[async_trait]
impl EventApi for HttpApi {
    async fn search_events(&self, keyword: &str) -> Result<SearchResponse, ApiError> {
        let url = self.config.endpoint("/api/search");
        debug!(%url, keyword, "GET");
        let response = self
            .client
            .get(url)
            .query(&[("keyword", keyword)])
            .send()
            .await?;
        decode(response).await
    }
}

/// Passes 2xx responses through; otherwise turns the error body's `detail`
/// into `ApiError::Server`, falling back to the bare status.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail_text());

    warn!(status = status.as_u16(), detail = ?detail, "API request failed");
    match detail {
        Some(detail) => Err(ApiError::Server(detail)),
        None => Err(ApiError::Status(status.as_u16())),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}
