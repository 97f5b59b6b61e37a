//! Google API Authenticated HTTP Client
//!
//! Bearer-token HTTP client for the Drive v3 REST API. Handles the Google
//! error envelope, rate-limit responses, page iteration, media download and
//! multipart (`multipart/related`) uploads. No retry or backoff happens
//! here; failures are surfaced as-is.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::DriveError;

/// Google API HTTP client with bearer-token injection
pub struct GoogleClient {
    client: Client,
    access_token: String,
}

impl GoogleClient {
    pub fn new(access_token: String) -> Result<Self, DriveError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DriveError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            access_token,
        })
    }

    /// Make an authenticated GET request returning JSON
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value, DriveError> {
        let builder = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.access_token);

        self.execute_request(builder).await
    }

    /// Make an authenticated GET request returning the raw body bytes
    pub async fn get_bytes(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, DriveError> {
        let builder = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.access_token);

        debug!("Executing Google API media request");
        let response = builder
            .send()
            .await
            .map_err(|e| DriveError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by Google API");
            return Err(DriveError::RateLimited);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::new());
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            return Err(extract_error(&parsed, status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DriveError::Transport(format!("failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post(&self, url: &str, query: &[(&str, String)], body: &Value) -> Result<Value, DriveError> {
        let builder = self
            .client
            .post(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .json(body);

        self.execute_request(builder).await
    }

    /// Make an authenticated PATCH request with JSON body
    pub async fn patch(&self, url: &str, query: &[(&str, String)], body: &Value) -> Result<Value, DriveError> {
        let builder = self
            .client
            .patch(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .json(body);

        self.execute_request(builder).await
    }

    /// POST a `multipart/related` upload (metadata part + media part)
    pub async fn post_multipart(
        &self,
        url: &str,
        query: &[(&str, String)],
        metadata: &Value,
        media_type: &str,
        media: &[u8],
    ) -> Result<Value, DriveError> {
        let boundary = upload_boundary();
        let body = related_body(&boundary, metadata, media_type, media);

        let builder = self
            .client
            .post(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);

        self.execute_request(builder).await
    }

    /// PATCH a `multipart/related` upload (metadata update + new media)
    pub async fn patch_multipart(
        &self,
        url: &str,
        query: &[(&str, String)],
        metadata: &Value,
        media_type: &str,
        media: &[u8],
    ) -> Result<Value, DriveError> {
        let boundary = upload_boundary();
        let body = related_body(&boundary, metadata, media_type, media);

        let builder = self
            .client
            .patch(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);

        self.execute_request(builder).await
    }

    /// Execute a request and handle Google API response patterns
    async fn execute_request(&self, builder: RequestBuilder) -> Result<Value, DriveError> {
        debug!("Executing Google API request");

        let response = builder
            .send()
            .await
            .map_err(|e| DriveError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by Google API");
            return Err(DriveError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| DriveError::Transport(format!("failed to read response body: {}", e)))?;

        // Empty successful responses (e.g., DELETE)
        if status.is_success() && body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            DriveError::Transport(format!("failed to parse JSON response: {} (body: {})", e, body))
        })?;

        if !status.is_success() {
            let err = extract_error(&parsed, status);
            error!("Google API error: {}", err);
            return Err(err);
        }

        Ok(parsed)
    }

    /// Iterate `files.list` pages with `nextPageToken` until `max_results`
    /// items are collected or pages run out.
    pub async fn get_file_pages(
        &self,
        url: &str,
        base_query: &[(&str, String)],
        max_results: usize,
    ) -> Result<Vec<Value>, DriveError> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = base_query.to_vec();
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }
            // API caps pageSize at 100 for files.list
            query.push(("pageSize", max_results.min(100).to_string()));

            let response = self.get(url, &query).await?;

            if let Some(items) = response.get("files").and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());

                if all_items.len() >= max_results {
                    all_items.truncate(max_results);
                    break;
                }
            }

            match response.get("nextPageToken").and_then(|v| v.as_str()) {
                Some(next_token) => page_token = Some(next_token.to_string()),
                None => break,
            }
        }

        Ok(all_items)
    }
}

/// Map a Google API error body to a DriveError.
///
/// Google APIs return errors as:
/// `{ "error": { "code": 400, "message": "...", "errors": [...] } }`
fn extract_error(response: &Value, status: StatusCode) -> DriveError {
    if let Some(error_obj) = response.get("error") {
        if let Some(message) = error_obj.get("message").and_then(|v| v.as_str()) {
            let code = error_obj
                .get("code")
                .and_then(|v| v.as_i64())
                .unwrap_or(status.as_u16() as i64);

            return DriveError::Backend {
                code,
                message: message.to_string(),
            };
        }
    }

    DriveError::Backend {
        code: status.as_u16() as i64,
        message: format!("HTTP {} error", status),
    }
}

fn upload_boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("drivegate-{:x}", nanos)
}

fn related_body(boundary: &str, metadata: &Value, media_type: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 512);
    body.extend_from_slice(
        format!("--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n", boundary)
            .as_bytes(),
    );
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(
        format!("\r\n--{}\r\nContent-Type: {}\r\n\r\n", boundary, media_type).as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_google_error_envelope() {
        let error_response = serde_json::json!({
            "error": {
                "code": 400,
                "message": "Invalid request format"
            }
        });

        let err = extract_error(&error_response, StatusCode::BAD_REQUEST);
        match err {
            DriveError::Backend { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Invalid request format");
            }
            other => panic!("unexpected error variant: {:?}", other),
        }
    }

    #[test]
    fn falls_back_to_http_status() {
        let err = extract_error(&Value::Null, StatusCode::BAD_GATEWAY);
        match err {
            DriveError::Backend { code, message } => {
                assert_eq!(code, 502);
                assert!(message.contains("502"));
            }
            other => panic!("unexpected error variant: {:?}", other),
        }
    }

    #[test]
    fn related_body_contains_both_parts() {
        let metadata = serde_json::json!({"name": "notes.txt"});
        let body = related_body("b-123", &metadata, "text/plain", b"hello");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b-123\r\n"));
        assert!(text.contains("Content-Type: application/json"));
        assert!(text.contains(r#""name":"notes.txt""#));
        assert!(text.contains("Content-Type: text/plain"));
        assert!(text.contains("hello"));
        assert!(text.ends_with("--b-123--\r\n"));
    }
}
