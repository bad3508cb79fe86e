use crate::api_url::{endpoint_url, parse_api_base_url};
use crate::auth::AuthContext;
use crate::backtest::BacktestScope;
use crate::error::ApiError;
use anyhow::{Context, Result};
use dashmap::DashSet;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub fn build_async_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("failed to build HTTP client")
}

/// Authenticated wrapper around the backtesting server's REST API.
///
/// Every response is normalized the same way: non-success statuses become
/// `ApiError::Status`, an empty success body becomes an empty JSON array,
/// and anything else must parse as JSON.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthContext,
    pub(crate) backtested: Arc<DashSet<BacktestScope>>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: &str, auth: AuthContext) -> Result<Self, ApiError> {
        Ok(Self {
            http,
            base_url: parse_api_base_url(base_url)?,
            auth,
            backtested: Arc::new(DashSet::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Same connection pool and backtest markers, different credentials.
    pub fn with_auth(&self, auth: AuthContext) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            auth,
            backtested: Arc::clone(&self.backtested),
        }
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(value) = self.auth.header_value() {
            let value = HeaderValue::from_str(&value).map_err(|_| ApiError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    pub async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = endpoint_url(&self.base_url, segments)?;
        match body {
            Some(body) => debug!("{} {} body={}", method, url, body),
            None => debug!("{} {}", method, url),
        }

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(self.headers()?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!(
            "{} {} -> {} raw response body: {}",
            method,
            url,
            status.as_u16(),
            text
        );

        let value = normalize_response(status.as_u16(), status.is_success(), text)?;
        debug!("{} {} parsed response: {}", method, url, value);
        Ok(value)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        expected: &'static str,
    ) -> Result<T, ApiError> {
        let value = self.send(Method::GET, segments, None).await?;
        decode(value, expected)
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.send(Method::POST, segments, Some(&body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.send(Method::PUT, segments, Some(&body)).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<Value, ApiError> {
        self.send(Method::DELETE, segments, None).await
    }
}

/// Status and body of a finished request to the value handed to callers.
/// An empty success body is reported as `[]` so list consumers can iterate
/// it directly; single-object decoders then reject it as a shape mismatch.
pub fn normalize_response(status: u16, success: bool, text: String) -> Result<Value, ApiError> {
    if !success {
        return Err(ApiError::from_status(status, text));
    }
    if text.trim().is_empty() {
        debug!("Empty response, returning empty array");
        return Ok(Value::Array(Vec::new()));
    }
    serde_json::from_str(&text).map_err(|source| ApiError::InvalidJson { body: text, source })
}

pub fn decode<T: DeserializeOwned>(value: Value, expected: &'static str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::UnexpectedShape {
        expected,
        detail: err.to_string(),
    })
}

/// Describes a JSON value's kind for shape errors.
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_success_body_is_an_empty_array() {
        assert_eq!(
            normalize_response(200, true, String::new()).unwrap(),
            json!([])
        );
        assert_eq!(
            normalize_response(204, true, "  \n".into()).unwrap(),
            json!([])
        );
    }

    #[test]
    fn error_status_carries_body() {
        let err = normalize_response(404, false, r#"{"detail":"Environment not found"}"#.into())
            .unwrap_err();
        match err {
            ApiError::Status {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Environment not found");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_json_keeps_offending_text() {
        let err = normalize_response(200, true, "<html>oops</html>".into()).unwrap_err();
        match err {
            ApiError::InvalidJson { body, .. } => assert_eq!(body, "<html>oops</html>"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn decode_reports_expected_shape() {
        let err = decode::<Vec<String>>(json!({"a": 1}), "a list of names").unwrap_err();
        assert!(matches!(
            err,
            ApiError::UnexpectedShape {
                expected: "a list of names",
                ..
            }
        ));
        assert_eq!(describe(&json!([])), "an array");
    }

    #[test]
    fn anonymous_client_sends_no_authorization() {
        let http = reqwest::Client::new();
        let anonymous = ApiClient::new(http, "http://127.0.0.1:8000", AuthContext::anonymous())
            .unwrap();
        let headers = anonymous.headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");

        let authed = anonymous.with_auth(AuthContext::bearer("tok"));
        assert_eq!(
            authed.headers().unwrap().get(AUTHORIZATION).unwrap(),
            "Bearer tok"
        );

        let broken = anonymous.with_auth(AuthContext::bearer("bad\ntoken"));
        assert!(matches!(broken.headers(), Err(ApiError::InvalidToken)));
    }
}
