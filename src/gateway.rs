//! Authenticated request execution and response normalization.
//!
//! Every response, whatever its shape, ends up as either a parsed JSON body or a
//! [`Kind::Status`](crate::error::Kind::Status) error carrying a single message:
//!
//! | response                                   | result                    |
//! |--------------------------------------------|---------------------------|
//! | non-2xx, JSON body with `message`          | error with that message   |
//! | non-2xx, anything else                     | error with [`FALLBACK_ERROR_MESSAGE`] |
//! | 204                                        | `{"success": true}`       |
//! | 2xx, non-JSON content type or empty body   | `{"success": true}`       |
//! | 2xx, JSON content type, unparsable body    | `{"success": true}`       |
//! | 2xx, JSON content type, parsable body      | the parsed body           |
//!
//! The last-but-one row is deliberately lenient; callers must tolerate it.

use std::sync::Arc;

use bon::Builder;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use secrecy::ExposeSecret as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::Result;
use crate::config::ClientConfig;
use crate::credential::CredentialStore;
use crate::error::Error;

/// Message used when a failed response carries no readable `message`.
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-call options for [`RequestGateway::request`].
#[derive(Clone, Debug, Default, Builder)]
pub struct RequestOptions {
    #[builder(default = Method::GET)]
    pub method: Method,
    pub body: Option<Value>,
    pub query: Option<Value>,
    #[builder(default)]
    pub headers: HeaderMap,
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::builder().build()
    }

    pub fn post<B: serde::Serialize + ?Sized>(body: &B) -> Result<Self> {
        Ok(Self::builder()
            .method(Method::POST)
            .body(serde_json::to_value(body)?)
            .build())
    }

    pub fn patch<B: serde::Serialize + ?Sized>(body: &B) -> Result<Self> {
        Ok(Self::builder()
            .method(Method::PATCH)
            .body(serde_json::to_value(body)?)
            .build())
    }
}

#[derive(Debug)]
pub struct RequestGateway {
    config: ClientConfig,
    client: ReqwestClient,
    credentials: Arc<CredentialStore>,
}

impl RequestGateway {
    #[must_use]
    pub fn new(config: ClientConfig, client: ReqwestClient, credentials: Arc<CredentialStore>) -> Self {
        Self {
            config,
            client,
            credentials,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Executes `path` under the base path and normalizes the response.
    ///
    /// The credential is read fresh on every call.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let url = self.config.endpoint(path)?;
        let method = options.method;
        let request_path = url.path().to_owned();

        let mut headers = self.base_headers()?;
        headers.extend(options.headers);

        let mut builder = self.client.request(method.clone(), url).headers(headers);
        if let Some(query) = &options.query {
            builder = builder.query(query);
        }
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        normalize(response, method, request_path).await
    }

    /// [`request`](Self::request) followed by a typed decode of the body.
    pub async fn request_typed<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let value = self.request(path, options).await?;
        decode(value)
    }

    fn base_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.config.user_agent)?);

        if let Some(token) = self.credentials.get() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

async fn normalize(response: reqwest::Response, method: Method, path: String) -> Result<Value> {
    let status = response.status();

    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let message = failure_message(&body);

        #[cfg(feature = "tracing")]
        tracing::warn!(status = %status, method = %method, path = %path, message = %message, "API request failed");

        return Err(Error::status(status, method, path, message));
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(success());
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains(JSON_CONTENT_TYPE));
    if !is_json {
        return Ok(success());
    }

    let text = response.text().await?;
    Ok(success_body(&text))
}

/// Message for a non-2xx body: its JSON `message` field, or the fallback.
#[must_use]
pub fn failure_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_owned())
}

/// Parsed value for a 2xx JSON body.
#[must_use]
pub fn success_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return success();
    }

    match serde_json::from_str(text) {
        Ok(value) => value,
        #[cfg_attr(not(feature = "tracing"), expect(unused_variables, reason = "logged only with tracing"))]
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "JSON content type with unparsable body, treating as success");
            success()
        }
    }
}

fn success() -> Value {
    json!({ "success": true })
}

#[cfg(not(feature = "tracing"))]
fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(feature = "tracing")]
fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    let mut ignored = Vec::new();
    let deserializer = serde_ignored::Deserializer::new(value, |path| {
        ignored.push(path.to_string());
    });

    let decoded = serde_path_to_error::deserialize(deserializer).map_err(|e| {
        tracing::warn!(path = %e.path(), error = %e.inner(), "failed to decode response");
        Error::with_source(crate::error::Kind::Internal, e.into_inner())
    })?;

    if !ignored.is_empty() {
        tracing::debug!(
            ty = std::any::type_name::<T>(),
            fields = ?ignored,
            "response carried fields the client ignores"
        );
    }
    Ok(decoded)
}
