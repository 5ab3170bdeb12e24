//! Blocking HTTP client for the Ollama server.
//!
//! Both the embedding gateway and the chat model talk to the same Ollama
//! instance. Every request carries the configured timeout and is retried
//! at most `max_retries` times (capped at one) on network errors, HTTP 429
//! and 5xx. Other 4xx responses fail immediately.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OllamaConfig;

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Ollama connection error (is Ollama running at {url}?): {reason}")]
    Connection { url: String, reason: String },

    #[error("Ollama response from {url} interrupted: {reason}")]
    BodyRead { url: String, reason: String },

    #[error("Ollama API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Ollama JSON parse error: {0}")]
    Decode(String),
}

impl OllamaError {
    fn is_retryable(&self) -> bool {
        match self {
            OllamaError::Connection { .. } | OllamaError::BodyRead { .. } => true,
            OllamaError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub struct OllamaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self, OllamaError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OllamaError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.min(1),
        })
    }

    /// POST a JSON body to `path` and decode the JSON response.
    pub fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, OllamaError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            match self.send_once(&url, body) {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("Request to {url} failed, retrying ({attempt}/{}): {e}", self.max_retries);
                    thread::sleep(RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send_once<B, R>(&self, url: &str, body: &B) -> Result<R, OllamaError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .map_err(|e| OllamaError::Connection {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OllamaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // A timeout mid-body is a transport failure, not a bad payload
        let bytes = response.bytes().map_err(|e| OllamaError::BodyRead {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice::<R>(&bytes).map_err(|e| OllamaError::Decode(e.to_string()))
    }
}
