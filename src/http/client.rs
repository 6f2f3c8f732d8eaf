//! HTTP client for the package index. One attempt per call.

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::status::{from_reqwest, status_error};
use crate::error::{Error, Result};

/// HTTP client shared by every index request of a session.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_json_with_query(url, &[]).await
    }

    /// Performs a GET request with query parameters and deserializes the JSON response.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!("GET JSON from {} with query {:?}...", url, query);
        let body = self.fetch(url, query).await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::parse(format!("Malformed JSON from {}: {}", url, e)))
    }

    /// Performs a GET request with query parameters and returns the body as text.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_text_with_query(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        debug!("GET text from {} with query {:?}...", url, query);
        self.fetch(url, query).await
    }

    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| from_reqwest(e, url))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| from_reqwest(e, url))?;

        if !status.is_success() {
            debug!("{} answered HTTP {}", url, status.as_u16());
            return Err(status_error(status, url, &body));
        }

        debug!("Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
