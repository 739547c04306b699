// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI REST API.
//!
//! Provides [`OpenAiClient`] which handles authentication, request
//! construction, and the mapping of HTTP failures onto [`ParleyError`].
//! Rate limits and server errors become [`ParleyError::Transient`]; callers
//! decide whether to retry.

use std::time::Duration;

use parley_core::ParleyError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::ApiErrorResponse;

/// HTTP client for OpenAI API communication.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a client authenticated with `api_key` against `base_url`.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                ParleyError::Config(format!("invalid API key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POSTs a JSON body and decodes a JSON reply.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ParleyError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(send_error)?;
        let body = checked(path, response).await?.text().await.map_err(read_error)?;
        serde_json::from_str(&body).map_err(|e| ParleyError::Provider {
            message: format!("failed to parse {path} response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// POSTs a JSON body and returns the raw reply bytes (audio).
    pub async fn post_json_for_bytes<B>(&self, path: &str, body: &B) -> Result<Vec<u8>, ParleyError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(send_error)?;
        let bytes = checked(path, response).await?.bytes().await.map_err(read_error)?;
        Ok(bytes.to_vec())
    }

    /// POSTs a multipart form with one file part and decodes a JSON reply.
    pub async fn post_file<R>(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        file: Vec<u8>,
        mime_type: &str,
    ) -> Result<R, ParleyError>
    where
        R: DeserializeOwned,
    {
        let part = Part::bytes(file)
            .file_name(format!("upload.{}", extension_for(mime_type)))
            .mime_str(mime_type)
            .map_err(|e| ParleyError::Validation(format!("invalid mime type {mime_type}: {e}")))?;
        let form = fields
            .iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name.to_string(), value.to_string())
            })
            .part("file", part);

        let response = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(send_error)?;
        let body = checked(path, response).await?.text().await.map_err(read_error)?;
        serde_json::from_str(&body).map_err(|e| ParleyError::Provider {
            message: format!("failed to parse {path} response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

/// Passes successful responses through and turns the rest into errors.
async fn checked(path: &str, response: reqwest::Response) -> Result<reqwest::Response, ParleyError> {
    let status = response.status();
    debug!(path, status = %status, "OpenAI response received");
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ParleyError {
    let detail = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => match api_err.error.error_type {
            Some(kind) => format!("{kind}: {}", api_err.error.message),
            None => api_err.error.message,
        },
        Err(_) => body.to_string(),
    };
    let message = format!("OpenAI API returned {status}: {detail}");
    if is_transient_status(status) {
        ParleyError::Transient { message }
    } else {
        ParleyError::Provider {
            message,
            source: None,
        }
    }
}

fn send_error(e: reqwest::Error) -> ParleyError {
    if e.is_timeout() || e.is_connect() {
        ParleyError::Transient {
            message: format!("HTTP request failed: {e}"),
        }
    } else {
        ParleyError::Provider {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

fn read_error(e: reqwest::Error) -> ParleyError {
    ParleyError::Provider {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

fn extension_for(mime_type: &str) -> &str {
    let subtype = mime_type
        .split(';')
        .next()
        .and_then(|m| m.rsplit('/').next())
        .unwrap_or("bin")
        .trim();
    match subtype {
        "mpeg" => "mp3",
        "x-m4a" | "mp4" => "m4a",
        "x-wav" | "wave" => "wav",
        "" => "bin",
        other => other,
    }
}
