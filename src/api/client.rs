//! HTTP client for the transcription backend.

use futures_util::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::path::Path;

use super::models::{
    DiskSpace, LoginResponse, TranscribeResponse, TranscriptionDetail, TranscriptionPage,
};
use crate::error::{ApiError, ValidationError};
use crate::listing::TranscriptQuery;
use crate::session::{Session, User};
use crate::upload::{mime_for, validate_upload, Language};

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
    session: Session,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self::with_http(base_url, session, reqwest::Client::new())
    }

    pub fn with_http(base_url: impl Into<String>, session: Session, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            http,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session.get_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }

    /// Sign in and persist the token and profile into the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::EmptyCredentials.into());
        }
        let response = self
            .http
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            log::warn!("[api] login rejected for {}: {}", username, response.status());
            return Err(ApiError::Unauthorized);
        }
        let login: LoginResponse = Self::check(response).await?.json().await?;
        if login.access_token.is_empty() {
            return Err(ApiError::Unauthorized);
        }

        let user = User {
            id: String::new(),
            username: login.user_name.clone().unwrap_or_else(|| username.to_string()),
            role: login.role.clone().unwrap_or_default(),
            group_name: login.group_name.clone(),
        };
        self.session.store_login(&login.access_token, &user)?;
        Ok(user)
    }

    pub async fn get_transcription(&self, id: &str) -> Result<TranscriptionDetail, ApiError> {
        let req = self.http.get(self.url(&format!("/transcription/{}", id)));
        let response = Self::check(self.authorized(req).send().await?).await?;
        let json: serde_json::Value = response.json().await?;
        TranscriptionDetail::from_envelope(json)
    }

    pub async fn list_transcriptions(&self, query: &TranscriptQuery) -> Result<TranscriptionPage, ApiError> {
        let req = self.http.get(self.url("/transcriptions")).query(&query.query_pairs());
        let response = Self::check(self.authorized(req).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Upload a media file for transcription.
    pub async fn transcribe(&self, path: &Path, language: Language) -> Result<TranscribeResponse, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(ValidationError::EmptySelection)?
            .to_string();
        validate_upload(&file_name, None)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Network(format!("cannot read {}: {}", path.display(), e)))?;
        log::info!("[api] uploading {} ({} bytes, language={})", file_name, bytes.len(), language.code());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_for(&file_name))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("language", language.code());

        let req = self.http.post(self.url("/transcribe")).multipart(form);
        let response = Self::check(self.authorized(req).send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn disk_space(&self) -> Result<DiskSpace, ApiError> {
        let req = self.http.get(self.url("/disk-space"));
        let response = Self::check(self.authorized(req).send().await?).await?;
        Ok(response.json().await?)
    }

    pub fn audio_url(&self, id: &str) -> String {
        self.url(&format!("/transcription/{}/audio", id))
    }

    /// Download an audio body. `on_progress` receives (bytes_downloaded, total_bytes);
    /// total is None without a Content-Length header.
    pub async fn fetch_audio<F>(&self, url: &str, mut on_progress: F) -> Result<AudioDownload, ApiError>
    where
        F: FnMut(u64, Option<u64>) + Send,
    {
        let response = Self::check(self.authorized(self.http.get(url)).send().await?).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let total = response.content_length();
        let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            body.extend_from_slice(&bytes);
            on_progress(body.len() as u64, total);
        }
        Ok(AudioDownload {
            bytes: body,
            content_type,
        })
    }
}

/// Downloaded audio body with the media type the server declared.
#[derive(Debug, Clone)]
pub struct AudioDownload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionStoreError;
    use crate::session::FileSessionStore;
    use crate::test_support::{client, serve_once};

    #[tokio::test]
    async fn login_stores_token_and_profile() {
        let body = br#"{"access_token":"abc","user_name":"alice","group_name":"dev","role":"member"}"#;
        let (base, server) = serve_once("200 OK", "application/json", body.to_vec()).await;
        let session = Session::in_memory();
        let api = client(&base, session.clone());

        let user = api.login("alice", "s3cret").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.group_name.as_deref(), Some("dev"));
        assert_eq!(session.get_token().as_deref(), Some("abc"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /login "));
        assert!(request.contains("application/x-www-form-urlencoded"));
        assert!(request.contains("username=alice&password=s3cret"));
    }

    #[tokio::test]
    async fn rejected_login_leaves_session_empty() {
        let (base, _server) = serve_once("401 Unauthorized", "application/json", b"{}".to_vec()).await;
        let session = Session::in_memory();
        let api = client(&base, session.clone());

        assert!(matches!(api.login("bob", "wrong").await, Err(ApiError::Unauthorized)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn unwritable_session_store_fails_login_as_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = FileSessionStore::open(&blocker.join("session.json")).unwrap();
        let session = Session::new(std::sync::Arc::new(store));

        let body = br#"{"access_token":"abc","user_name":"alice","role":"member"}"#;
        let (base, _server) = serve_once("200 OK", "application/json", body.to_vec()).await;
        let api = client(&base, session.clone());

        assert!(matches!(
            api.login("alice", "s3cret").await,
            Err(ApiError::Session(SessionStoreError::Io(_)))
        ));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn empty_credentials_never_hit_the_network() {
        let api = client("http://127.0.0.1:9", Session::in_memory());
        assert!(matches!(
            api.login("", "pw").await,
            Err(ApiError::Validation(ValidationError::EmptyCredentials))
        ));
    }

    #[tokio::test]
    async fn detail_request_carries_bearer_token() {
        let body = br#"{"data":{"data":{"transcription_id":5,"transcription_title":"Call","tags":[],"audio_duration":60,"created_at":"2025-01-01"}}}"#;
        let (base, server) = serve_once("200 OK", "application/json", body.to_vec()).await;
        let session = Session::in_memory();
        session
            .store_login("tok", &User { id: String::new(), username: "u".into(), role: String::new(), group_name: None })
            .unwrap();
        let api = client(&base, session);

        let detail = api.get_transcription("5").await.unwrap();
        assert_eq!(detail.transcription_title, "Call");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /transcription/5 "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn list_sends_pagination_and_search() {
        let body = br#"{"total_count":1,"total_pages":1,"current_page":1,"data":[{"transcription_id":1,"transcription_title":"A","tags":["x"],"audio_duration":5,"created_at":"2025-01-01"}]}"#;
        let (base, server) = serve_once("200 OK", "application/json", body.to_vec()).await;
        let api = client(&base, Session::in_memory());

        let page = api
            .list_transcriptions(&TranscriptQuery::new(10).with_search("weekly"))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /transcriptions?page=1&page_size=10&name=weekly "));
    }

    #[tokio::test]
    async fn server_error_surfaces_status() {
        let (base, _server) = serve_once("500 Internal Server Error", "text/plain", b"boom".to_vec()).await;
        let api = client(&base, Session::in_memory());
        match api.disk_space().await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_audio_reports_progress() {
        let (base, _server) = serve_once("200 OK", "audio/wav", vec![7u8; 2048]).await;
        let api = client(&base, Session::in_memory());
        let mut last = (0, None);
        let download = api
            .fetch_audio(&format!("{}/transcription/1/audio", base), |done, total| last = (done, total))
            .await
            .unwrap();
        assert_eq!(download.bytes.len(), 2048);
        assert_eq!(download.content_type.as_deref(), Some("audio/wav"));
        assert_eq!(last, (2048, Some(2048)));
    }

    #[test]
    fn audio_url_is_derived_from_id() {
        let api = client("http://host/api/v1/", Session::in_memory());
        assert_eq!(api.audio_url("42"), "http://host/api/v1/transcription/42/audio");
    }
}
