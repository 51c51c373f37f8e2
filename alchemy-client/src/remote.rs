//! Remote progress API and its HTTP binding.

use alchemy_core::{InitResponse, SaveRequest, SaveResponse};
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use url::Url;

/// Header carrying the user identity.
pub const USER_HEADER: &str = "x-user-id";

/// Errors that can occur when talking to the progress server.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The base URL provided by configuration is invalid.
    #[error("invalid progress server URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, status).
    #[error("progress request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered a save with `success: false`.
    #[error("progress save rejected by server")]
    Rejected,
    /// No remote is configured.
    #[error("no progress server configured")]
    Offline,
    /// The background task running the request died.
    #[error("progress task failed: {0}")]
    Task(String),
}

impl RemoteError {
    /// Returns true if a later attempt might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// The two remote progress operations.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch the user's saved progress.
    async fn fetch_init(&self) -> Result<InitResponse, RemoteError>;

    /// Save progress. The payload is already capped.
    async fn save_progress(&self, request: &SaveRequest) -> Result<SaveResponse, RemoteError>;
}

/// Remote used when no server is configured; every call fails fast.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemote;

#[async_trait]
impl RemoteApi for OfflineRemote {
    async fn fetch_init(&self) -> Result<InitResponse, RemoteError> {
        Err(RemoteError::Offline)
    }

    async fn save_progress(&self, _request: &SaveRequest) -> Result<SaveResponse, RemoteError> {
        Err(RemoteError::Offline)
    }
}

/// HTTP client for `GET /api/init` and `POST /api/progress`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    http: Client,
    init_url: Url,
    progress_url: Url,
    user: Option<String>,
}

impl HttpRemote {
    /// Create a client for the server at `base_url`.
    ///
    /// Without a user every request is anonymous: init returns empty
    /// progress and saves are not stored.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if the URL is malformed.
    /// Returns [`RemoteError::Http`] if the HTTP client fails to build.
    pub fn new(base_url: &str, user: Option<String>) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let init_url = base
            .join("api/init")
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        let progress_url = base
            .join("api/progress")
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .user_agent(concat!("alchemy-play/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;

        Ok(Self {
            http,
            init_url,
            progress_url,
            user,
        })
    }

    fn with_user(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.user {
            Some(user) => request.header(USER_HEADER, user),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn fetch_init(&self) -> Result<InitResponse, RemoteError> {
        let response = self
            .with_user(self.http.get(self.init_url.clone()))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn save_progress(&self, request: &SaveRequest) -> Result<SaveResponse, RemoteError> {
        let response = self
            .with_user(self.http.post(self.progress_url.clone()))
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let saved: SaveResponse = response.json().await?;
        if saved.success {
            Ok(saved)
        } else {
            Err(RemoteError::Rejected)
        }
    }
}
