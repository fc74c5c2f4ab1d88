//! Firestore REST v1 backend for `DocumentStore`.
//!
//! Each metric is one document in a single collection, addressed as
//! `projects/{project}/databases/(default)/documents/{collection}/{name}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::storage::{Document, DocumentStore, StoreError, StoreResult};

pub mod auth;
pub mod codec;

pub use auth::{ServiceAccount, TokenProvider};

const PUBLIC_ENDPOINT: &str = "https://firestore.googleapis.com";
const PAGE_SIZE: u32 = 300;

/// Connection settings for `FirestoreStore`.
#[derive(Debug, Clone)]
pub struct FirestoreOptions {
    pub project_id: String,
    pub collection: String,
    /// Required unless `emulator_host` is set.
    pub credentials: Option<ServiceAccount>,
    /// `host:port` of a local emulator; requests go over plain HTTP without auth.
    pub emulator_host: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Firestore collection client. One instance is shared by every request.
pub struct FirestoreStore {
    http: reqwest::Client,
    collection_url: Url,
    auth: Option<TokenProvider>,
}

impl FirestoreStore {
    pub fn new(opts: FirestoreOptions) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(opts.request_timeout)
            .build()
            .map_err(|e| StoreError::Backend(format!("build http client: {e}")))?;

        let (endpoint, auth) = match &opts.emulator_host {
            Some(host) => (format!("http://{}", host.trim_end_matches('/')), None),
            None => {
                let account = opts.credentials.clone().ok_or_else(|| {
                    StoreError::Auth("service account credentials are required outside the emulator".into())
                })?;
                (PUBLIC_ENDPOINT.to_string(), Some(TokenProvider::new(http.clone(), account)?))
            }
        };
        let collection_url = collection_url(&endpoint, &opts.project_id, &opts.collection)?;
        debug!(url = %collection_url, emulator = opts.emulator_host.is_some(), "firestore store configured");
        Ok(Self { http, collection_url, auth })
    }

    fn document_url(&self, key: &str) -> StoreResult<Url> {
        document_url(&self.collection_url, key)
    }

    async fn request(&self, method: Method, url: Url) -> StoreResult<RequestBuilder> {
        let mut req = self.http.request(method, url);
        if let Some(auth) = &self.auth {
            let token = auth.access_token().await?;
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(req)
    }

    async fn send(req: RequestBuilder) -> StoreResult<Response> {
        req.send()
            .await
            .map_err(|e| StoreError::Backend(format!("request failed: {e}")))
    }
}

fn collection_url(endpoint: &str, project_id: &str, collection: &str) -> StoreResult<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| StoreError::Backend(format!("bad endpoint {endpoint}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| StoreError::Backend(format!("endpoint {endpoint} cannot carry a path")))?
        .clear()
        .extend(["v1", "projects", project_id, "databases", "(default)", "documents", collection]);
    Ok(url)
}

fn document_url(collection_url: &Url, key: &str) -> StoreResult<Url> {
    let mut url = collection_url.clone();
    url.path_segments_mut()
        .map_err(|_| StoreError::Backend("collection url cannot carry a path".into()))?
        .push(key);
    Ok(url)
}

/// Document id is the last segment of the resource name.
fn document_id(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}

/// Turn a non-success response into a `StoreError`.
async fn error_from(resp: Response, key: &str) -> StoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|env| format!("{} {}", env.error.status, env.error.message))
        .unwrap_or(body);
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(key.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Auth(format!("{status}: {}", detail.trim()))
        }
        _ => StoreError::Backend(format!("{status}: {}", detail.trim())),
    }
}

async fn decode_document(resp: Response) -> StoreResult<RawDocument> {
    resp.json::<RawDocument>()
        .await
        .map_err(|e| StoreError::Codec(format!("document body: {e}")))
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> StoreResult<Option<Document>> {
        let req = self.request(Method::GET, self.document_url(key)?).await?;
        let resp = Self::send(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_from(resp, key).await);
        }
        let raw = decode_document(resp).await?;
        Ok(Some(codec::decode_fields(raw.fields.as_ref())?))
    }

    #[instrument(skip(self, doc), level = "debug")]
    async fn set(&self, key: &str, doc: Document) -> StoreResult<()> {
        // PATCH without an update mask replaces the whole document, creating it if needed
        let body = json!({ "fields": codec::encode_fields(&doc) });
        let req = self.request(Method::PATCH, self.document_url(key)?).await?;
        let resp = Self::send(req.json(&body)).await?;
        if !resp.status().is_success() {
            return Err(error_from(resp, key).await);
        }
        Ok(())
    }

    #[instrument(skip(self, fields), level = "debug")]
    async fn update(&self, key: &str, fields: Document) -> StoreResult<()> {
        let mut url = self.document_url(key)?;
        {
            let mut query = url.query_pairs_mut();
            for name in fields.keys() {
                query.append_pair("updateMask.fieldPaths", &codec::field_path(name));
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = json!({ "fields": codec::encode_fields(&fields) });
        let req = self.request(Method::PATCH, url).await?;
        let resp = Self::send(req.json(&body)).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let err = error_from(resp, key).await;
        // a failed exists-precondition means the document is gone
        match err {
            StoreError::Backend(msg) if msg.contains("FAILED_PRECONDITION") || status == StatusCode::PRECONDITION_FAILED => {
                debug!(detail = %msg, "update precondition failed");
                Err(StoreError::NotFound(key.to_string()))
            }
            other => Err(other),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let req = self.request(Method::DELETE, self.document_url(key)?).await?;
        let resp = Self::send(req).await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(error_from(resp, key).await)
    }

    #[instrument(skip(self), level = "debug")]
    async fn scan_all(&self) -> StoreResult<Vec<(String, Document)>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.collection_url.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &PAGE_SIZE.to_string());
                if let Some(tok) = &page_token {
                    query.append_pair("pageToken", tok);
                }
            }
            let req = self.request(Method::GET, url).await?;
            let resp = Self::send(req).await?;
            if !resp.status().is_success() {
                return Err(error_from(resp, "<collection>").await);
            }
            let page: ListDocumentsResponse = resp
                .json()
                .await
                .map_err(|e| StoreError::Codec(format!("list body: {e}")))?;
            for raw in page.documents {
                let id = document_id(&raw.name).to_string();
                out.push((id, codec::decode_fields(raw.fields.as_ref())?));
            }
            match page.next_page_token {
                Some(tok) if !tok.is_empty() => page_token = Some(tok),
                _ => break,
            }
        }
        debug!(count = out.len(), "scanned firestore collection");
        Ok(out)
    }
}
