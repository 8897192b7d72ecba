//! Thin JSON client over reqwest shared by the adapters.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::HttpError;

/// A reqwest client bound to a base URL.
#[derive(Debug, Clone)]
pub struct JsonClient {
    inner: Client,
    base_url: String,
}

impl JsonClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, HttpError> {
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self::from_reqwest(inner, base_url))
    }

    pub fn from_reqwest(
        client: Client,
        base_url: &str,
    ) -> Self {
        Self {
            inner: client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(
        &self,
        path: &str,
    ) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<R>(
        &self,
        path: &str,
    ) -> Result<R, HttpError>
    where
        R: DeserializeOwned,
    {
        self.send(self.inner.get(self.url(path))).await
    }

    pub async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, HttpError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(self.inner.post(self.url(path)).json(body)).await
    }

    pub async fn patch_json<B, R>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, HttpError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(self.inner.patch(self.url(path)).json(body)).await
    }

    async fn send<R>(
        &self,
        request: RequestBuilder,
    ) -> Result<R, HttpError>
    where
        R: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "response received");

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
