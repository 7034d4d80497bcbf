//! PostgREST data store backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::query::Query;
use crate::{Error, Result};

use super::{DataStore, StoreError, StoreResponse};

const REST_PATH: &str = "rest/v1";

/// Hosted PostgREST endpoint (e.g. a Supabase project)
pub struct RestStore {
    http: reqwest::Client,
    base_url: Url,
}

impl RestStore {
    pub fn new(
        url: &str,
        key: &str,
        schema: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = parse_base_url(url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("apikey"),
            HeaderValue::from_str(key)
                .map_err(|_| Error::invalid_config("store key is not a valid header value"))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| Error::invalid_config("store key is not a valid header value"))?,
        );
        if let Some(schema) = schema {
            headers.insert(
                HeaderName::from_static("accept-profile"),
                HeaderValue::from_str(&schema)
                    .map_err(|_| Error::invalid_config("store schema is not a valid header value"))?,
            );
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/{}", REST_PATH, table))
            .map_err(|e| Error::internal(format!("invalid table url for {}: {}", table, e)))
    }
}

#[async_trait]
impl DataStore for RestStore {
    async fn execute(&self, query: &Query) -> Result<StoreResponse> {
        let url = self.table_url(&query.table)?;

        let response = self
            .http
            .get(url)
            .query(&query.to_params())
            .send()
            .await
            .map_err(|e| Error::transport(format!("PostgREST request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("PostgREST body read failed: {}", e)))?;

        if status.is_success() {
            let data: Vec<Value> = serde_json::from_str(&body)
                .map_err(|e| Error::decode(format!("PostgREST returned invalid rows: {}", e)))?;
            return Ok(StoreResponse::rows(data));
        }

        tracing::debug!(%status, table = %query.table, "PostgREST rejected query");
        Ok(StoreResponse::failed(parse_error(status, &body)))
    }

    fn backend(&self) -> &'static str {
        "rest"
    }
}

/// Normalise the project URL so that `join` appends below it
fn parse_base_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let parsed = Url::parse(&with_slash)
        .map_err(|e| Error::invalid_config(format!("invalid store url '{}': {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::invalid_config(format!(
            "unsupported store url scheme: {}",
            other
        ))),
    }
}

fn parse_error(status: StatusCode, body: &str) -> StoreError {
    if let Ok(error) = serde_json::from_str::<StoreError>(body) {
        return error;
    }

    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string())
    } else {
        trimmed.to_string()
    };

    StoreError::new(message).with_code(status.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_keeps_project_path() {
        let base = parse_base_url("https://example.supabase.co/proxy").unwrap();
        let url = base.join("rest/v1/circuits").unwrap();
        assert_eq!(url.as_str(), "https://example.supabase.co/proxy/rest/v1/circuits");
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_parse_postgrest_error_body() {
        let body = r#"{"code":"22P02","details":null,"hint":null,"message":"invalid input syntax for type integer: \"abc\""}"#;
        let error = parse_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(error.code.as_deref(), Some("22P02"));
        assert_eq!(error.message, "invalid input syntax for type integer: \"abc\"");
    }

    #[test]
    fn test_parse_plain_error_body() {
        let error = parse_error(StatusCode::SERVICE_UNAVAILABLE, "  upstream paused \n");
        assert_eq!(error.message, "upstream paused");
        assert_eq!(error.code.as_deref(), Some("503"));

        let error = parse_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(error.message, "Bad Gateway");
    }

    #[test]
    fn test_rejects_key_with_newline() {
        let result = RestStore::new("https://example.com", "bad\nkey", None, None);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
