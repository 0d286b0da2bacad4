use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, Method, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HttpMethod, Transport, TransportResponse};
use crate::errors::TransportError;

/// Header carrying the REST API version the client speaks
pub const API_VERSION_HEADER: &str = "QuickBlox-REST-API-Version";

/// How request parameters are put on the wire
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// `application/x-www-form-urlencoded`
    #[default]
    Form,
    /// `application/json`
    Json,
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client for API requests
    client: Client,
    /// Body encoding for requests that carry one
    encoding: BodyEncoding,
    /// Value of the API version header, if any
    api_version: Option<String>,
}

impl HttpTransport {
    /// Create a new transport with the given request timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            encoding: BodyEncoding::default(),
            api_version: None,
        }
    }

    /// Set the body encoding
    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Send the API version header with every request
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.api_version = if version.is_empty() { None } else { Some(version) };
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::ConnectionError(e.to_string())
    } else {
        TransportError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(to_reqwest_method(method), url)
            .header(header::ACCEPT, "application/json");

        if let Some(version) = &self.api_version {
            builder = builder.header(API_VERSION_HEADER, version);
        }

        if !body.is_null() {
            builder = match (method, self.encoding) {
                (HttpMethod::Get | HttpMethod::Delete, _) => builder.query(body),
                (_, BodyEncoding::Form) => builder.form(body),
                (_, BodyEncoding::Json) => builder.json(body),
            };
        }

        let response = builder.send().await.map_err(|e| {
            error!("{} {} failed: {}", method, url, e);
            map_reqwest_error(e)
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_reqwest_error)?;
        debug!("{} {} -> {}", method, url, status);

        Ok(TransportResponse::new(status, text))
    }
}
