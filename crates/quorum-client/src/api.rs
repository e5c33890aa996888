//! Typed HTTP client for the Quorum collection API.
//!
//! The bearer token is read from the [`SessionStore`] on every request, so a
//! login anywhere in the app authenticates every later call.

use crate::session::{Session, SessionStore};
use async_trait::async_trait;
use quorum_common::entities::{Entity, User};
use quorum_common::{QuorumError, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordList<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Clone)]
pub struct Api {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl Api {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: SessionStore::new(),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of an uploaded record file.
    pub fn file_url(&self, collection: &str, record_id: &str, filename: &str) -> String {
        format!("{}/files/{collection}/{record_id}/{filename}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = self.session.token() {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v["error"].as_str().map(String::from))
            .unwrap_or_else(|| status.to_string());
        Err(match status {
            StatusCode::NOT_FOUND => QuorumError::NotFound(message),
            StatusCode::UNAUTHORIZED => QuorumError::Unauthorized(message),
            StatusCode::FORBIDDEN => QuorumError::Forbidden(message),
            StatusCode::BAD_REQUEST => QuorumError::Validation(message),
            _ => QuorumError::Other(anyhow::anyhow!("server error {status}: {message}")),
        })
    }

    // ── Auth ───────────────────────────────────────────────────────────────

    pub async fn register(&self, req: &RegisterRequest) -> Result<User> {
        let resp = self
            .request(Method::POST, "/api/auth/register")
            .json(req)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Log in and store the session; subscribers see the change.
    pub async fn login(&self, identity: &str, password: &str) -> Result<Session> {
        let resp = self
            .request(Method::POST, "/api/auth/login")
            .json(&serde_json::json!({ "identity": identity, "password": password }))
            .send()
            .await?;
        let body: Value = Self::check(resp).await?.json().await?;
        let token = body["token"]
            .as_str()
            .ok_or_else(|| QuorumError::Validation("login reply lacked a token".into()))?
            .to_string();
        let user: User = serde_json::from_value(body["user"].clone())?;
        let session = Session { token, user };
        self.session.set(session.clone());
        Ok(session)
    }

    pub async fn logout(&self) -> Result<()> {
        let resp = self.request(Method::POST, "/api/auth/logout").send().await?;
        Self::check(resp).await?;
        self.session.clear();
        Ok(())
    }

    // ── Records ────────────────────────────────────────────────────────────

    pub async fn list<T: Entity>(&self, query: &ListQuery) -> Result<RecordList<T>> {
        let mut req = self.request(
            Method::GET,
            &format!("/api/collections/{}/records", T::COLLECTION),
        );
        if let Some(filter) = &query.filter {
            req = req.query(&[("filter", filter)]);
        }
        if let Some(page) = query.page {
            req = req.query(&[("page", page)]);
        }
        if let Some(per_page) = query.per_page {
            req = req.query(&[("per_page", per_page)]);
        }
        let resp = req.send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Untyped listing, for callers that work across collections (search).
    pub async fn list_raw(
        &self,
        collection: &str,
        filter: Option<&str>,
        per_page: u32,
    ) -> Result<Vec<Value>> {
        let mut req = self
            .request(Method::GET, &format!("/api/collections/{collection}/records"))
            .query(&[("per_page", per_page)]);
        if let Some(filter) = filter {
            req = req.query(&[("filter", filter)]);
        }
        let body: Value = Self::check(req.send().await?).await?.json().await?;
        Ok(body["items"].as_array().cloned().unwrap_or_default())
    }

    pub async fn get_one<T: Entity>(&self, id: &str) -> Result<T> {
        let resp = self
            .request(
                Method::GET,
                &format!("/api/collections/{}/records/{id}", T::COLLECTION),
            )
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Fetch a record with relation fields embedded under `expand`.
    pub async fn get_expanded(&self, collection: &str, id: &str, expand: &str) -> Result<Value> {
        let resp = self
            .request(
                Method::GET,
                &format!("/api/collections/{collection}/records/{id}"),
            )
            .query(&[("expand", expand)])
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn create<T: Entity>(&self, entity: &T) -> Result<T> {
        let body = strip_envelope(serde_json::to_value(entity)?);
        let resp = self
            .request(
                Method::POST,
                &format!("/api/collections/{}/records", T::COLLECTION),
            )
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn update_fields(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        let resp = self
            .request(
                Method::PATCH,
                &format!("/api/collections/{collection}/records/{id}"),
            )
            .json(&patch)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let resp = self
            .request(
                Method::DELETE,
                &format!("/api/collections/{collection}/records/{id}"),
            )
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Upload one model artifact (or avatar) via multipart.
    pub async fn upload_file(
        &self,
        collection: &str,
        id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Value> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .request(Method::POST, &format!("/api/files/{collection}/{id}"))
            .multipart(form)
            .send()
            .await?;
        debug!(collection, id, filename, "uploaded");
        Ok(Self::check(resp).await?.json().await?)
    }
}

/// Strip the server-managed envelope before sending fields back.
pub fn strip_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => {
            obj.remove("id");
            obj.remove("created");
            obj.remove("updated");
            obj.remove("expand");
            Value::Object(obj)
        }
        other => other,
    }
}

/// The slice of the API the editor needs, kept as a trait so editor logic is
/// testable without a server.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn save_record(&self, collection: &str, id: &str, patch: Value) -> Result<Value>;
}

#[async_trait]
impl RecordBackend for Api {
    async fn save_record(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        self.update_fields(collection, id, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_stripped() {
        let v = serde_json::json!({
            "id": "x", "created": "c", "updated": "u", "expand": {},
            "title": "kept"
        });
        let out = strip_envelope(v);
        assert_eq!(out, serde_json::json!({ "title": "kept" }));
    }

    #[test]
    fn file_urls_follow_the_storage_layout() {
        let api = Api::new("http://localhost:8090/");
        assert_eq!(
            api.file_url("models", "abc123", "weights.onnx"),
            "http://localhost:8090/files/models/abc123/weights.onnx"
        );
    }
}
