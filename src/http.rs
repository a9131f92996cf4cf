//! reqwest client for the backend API.
//!
//! Implements every consumed interface: notification endpoints, the SSE
//! push stream, preferences and themes. Each request is bounded by the
//! configured request timeout and every failure is normalised into a
//! [`SyncError`] before it leaves this module.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::ApiConfig;
use crate::error::{ErrorKind, SyncError};
use crate::notifications::{ListQuery, Notification, NotificationApi, PushMessage, PushSource};
use crate::preference::{PreferenceApi, PreferenceRecord};
use crate::session::SessionStore;
use crate::sse::SseDecoder;
use crate::theme::{ThemeApi, ThemeRecord};

const REQUEST_ID_HEADER: &str = "x-request-id";
const PUSH_BUFFER: usize = 64;
/// Longest error body excerpt kept in an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// The list endpoint answers with a bare array or a wrapped one.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Bare(Vec<Notification>),
    Wrapped {
        #[serde(alias = "notifications", alias = "data")]
        items: Vec<Notification>,
    },
}

impl ListEnvelope {
    fn into_items(self) -> Vec<Notification> {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Wrapped { items } => items,
        }
    }
}

#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    session: SessionStore,
    request_timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &ApiConfig, session: SessionStore) -> Result<Self, SyncError> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            SyncError::new(
                ErrorKind::Internal,
                format!("Invalid API base URL '{}': {e}", config.base_url),
            )
        })?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url,
            session,
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SyncError::new(
                    ErrorKind::Internal,
                    format!("API base URL '{}' cannot carry a path", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request_id = uuid::Uuid::new_v4().to_string();
        let builder = self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id);
        match self.session.token() {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Run `fut` under the request timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        timeout(self.request_timeout, fut)
            .await
            .map_err(|_| SyncError::timeout(self.request_timeout))?
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        let path = url.path().to_string();
        let builder = self.request(Method::GET, url);
        let value = self
            .bounded(async {
                let response = check_status(builder.send().await?).await?;
                let bytes = response.bytes().await?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .await;
        if let Err(e) = &value {
            tracing::debug!(path = %path, kind = %e.kind(), error = %e, "GET failed");
        }
        value
    }

    /// Send a mutation. A 404 counts as success: the target is already gone
    /// or already processed.
    async fn mutate(&self, method: Method, url: Url) -> Result<(), SyncError> {
        let builder = self.request(method, url);
        self.bounded(async {
            match check_status(builder.send().await?).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }
}

async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::from_status(status.as_u16(), error_message(status, &body)))
}

fn error_message(status: StatusCode, body: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Unknown status");
    let body = body.trim();
    if body.is_empty() {
        return reason.to_string();
    }
    let mut excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    if excerpt.len() < body.len() {
        excerpt.push('…');
    }
    format!("{reason}: {excerpt}")
}

#[async_trait]
impl NotificationApi for HttpApi {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Notification>, SyncError> {
        let mut url = self.endpoint(&["notifications"])?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        let envelope: ListEnvelope = self.get_json(url).await?;
        Ok(envelope.into_items())
    }

    async fn mark_read(&self, id: &str) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", id, "read"])?;
        self.mutate(Method::POST, url).await
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", "read-all"])?;
        self.mutate(Method::POST, url).await
    }

    async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", id])?;
        self.mutate(Method::DELETE, url).await
    }
}

#[async_trait]
impl PushSource for HttpApi {
    async fn subscribe(&self) -> Result<mpsc::Receiver<PushMessage>, SyncError> {
        let url = self.endpoint(&["notifications", "stream"])?;
        let builder = self
            .request(Method::GET, url)
            .header(ACCEPT, "text/event-stream");
        // Only the handshake is bounded; the body stays open indefinitely.
        let response = self
            .bounded(async { check_status(builder.send().await?).await })
            .await?;

        let (tx, rx) = mpsc::channel(PUSH_BUFFER);
        tokio::spawn(pump_events(response, tx));
        Ok(rx)
    }
}

/// Forward decoded messages until the body ends, fails, or the receiver
/// is dropped.
async fn pump_events(mut response: Response, tx: mpsc::Sender<PushMessage>) {
    let mut decoder = SseDecoder::new();
    loop {
        let chunk = tokio::select! {
            chunk = response.chunk() => chunk,
            _ = tx.closed() => return,
        };
        match chunk {
            Ok(Some(bytes)) => {
                for message in decoder.feed(&bytes) {
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Push stream read failed");
                return;
            }
        }
    }
}

#[async_trait]
impl PreferenceApi for HttpApi {
    async fn fetch_preferences(&self) -> Result<PreferenceRecord, SyncError> {
        let url = self.endpoint(&["users", "me", "preferences"])?;
        self.get_json(url).await
    }
}

#[async_trait]
impl ThemeApi for HttpApi {
    async fn fetch_theme(&self, key: &str) -> Result<ThemeRecord, SyncError> {
        let url = self.endpoint(&["themes", key])?;
        self.get_json(url).await
    }
}
