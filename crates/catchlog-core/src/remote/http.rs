//! REST/JSON client for a hosted document store

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Document, Filter, RemoteDocument, RemoteError, RemoteResult, RemoteStore, WriteBatch};
use crate::models::Collection;
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Document store reached over HTTP.
///
/// Endpoints live under `{base_url}/v1`. Connection failures and 5xx
/// responses are reported as [`RemoteError::Unavailable`].
#[derive(Clone)]
pub struct HttpDocumentStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpDocumentStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpDocumentStore")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpDocumentStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            api_key: normalize_text_option(api_key),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn documents_url(&self, collection: Collection) -> String {
        format!("{}/v1/collections/{}/documents", self.base_url, collection)
    }

    fn document_url(&self, collection: Collection, remote_id: &str) -> String {
        format!(
            "{}/{}",
            self.documents_url(collection),
            urlencoding::encode(remote_id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        self.authorized(request).send().await.map_err(|error| {
            if error.is_connect() || error.is_timeout() {
                RemoteError::Unavailable(error.to_string())
            } else {
                RemoteError::Http(error)
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    filters: &'a [Filter],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<RemoteDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl RemoteStore for HttpDocumentStore {
    async fn add(&self, collection: Collection, data: Document) -> RemoteResult<String> {
        let response = self
            .send(self.client.post(self.documents_url(collection)).json(&data))
            .await?;
        let created = check(response).await?.json::<CreatedResponse>().await?;
        if created.id.trim().is_empty() {
            return Err(RemoteError::InvalidPayload(
                "create response did not include an id".to_string(),
            ));
        }
        Ok(created.id)
    }

    async fn get(
        &self,
        collection: Collection,
        remote_id: &str,
    ) -> RemoteResult<Option<RemoteDocument>> {
        let response = self
            .send(self.client.get(self.document_url(collection, remote_id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document = check(response).await?.json::<RemoteDocument>().await?;
        Ok(Some(document))
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let url = format!("{}:query", self.documents_url(collection));
        let response = self
            .send(self.client.post(url).json(&QueryRequest { filters }))
            .await?;
        let payload = check(response).await?.json::<QueryResponse>().await?;
        Ok(payload.documents)
    }

    async fn update(
        &self,
        collection: Collection,
        remote_id: &str,
        patch: Document,
    ) -> RemoteResult<()> {
        let response = self
            .send(
                self.client
                    .patch(self.document_url(collection, remote_id))
                    .json(&patch),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                collection,
                remote_id: remote_id.to_string(),
            });
        }
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, remote_id: &str) -> RemoteResult<()> {
        let response = self
            .send(self.client.delete(self.document_url(collection, remote_id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> RemoteResult<()> {
        let url = format!("{}/v1/batch", self.base_url);
        let response = self.send(self.client.post(url).json(&batch)).await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if status.is_server_error() {
        Err(RemoteError::Unavailable(message))
    } else {
        Err(RemoteError::Api(message))
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let body = compact_text(body);
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", body, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Api("remote URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Api(
            "remote URL must include http:// or https://".to_string(),
        ))
    }
}
