//! HTTP client for the remote course API.

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::SessionHandle;
use crate::config::ApiConfig;
use crate::error::ApiError;

mod backend;
pub mod wire;

pub use backend::HttpBackend;

/// Read the body of a successful response, or map the status to an error.
pub(crate) async fn ensure_success(response: Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    if let Some(err) = ApiError::from_status(status) {
        tracing::debug!(%status, url = %response.url(), "api request failed");
        return Err(err);
    }
    Ok(response.bytes().await?.to_vec())
}

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidPayload(e.to_string()))
}

/// Authenticated JSON client.
///
/// Every request carries the bearer token of the injected session. A 401
/// expires that session before the error is returned.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: SessionHandle,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, session: SessionHandle) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Resolve `path` against the base url.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Url` if the joined url is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// GET `path` and return the raw body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures or non-2xx statuses.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(path)?;
        self.send(self.http.get(url)).await
    }

    /// POST a JSON body to `path` and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures or non-2xx statuses.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(path)?;
        self.post_url(url, body).await
    }

    /// POST to an absolute url, for services hosted outside the base url.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures or non-2xx statuses.
    pub async fn post_url<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Vec<u8>, ApiError> {
        self.send(self.http.post(url).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let request = match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        match ensure_success(response).await {
            Err(ApiError::Unauthenticated) => {
                self.session.expire();
                Err(ApiError::Unauthenticated)
            }
            other => other,
        }
    }
}
