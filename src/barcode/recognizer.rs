//! Remote barcode recognition.
//!
//! The decoder hands each rendered candidate to a `BarcodeRecognizer`. The
//! production implementation posts the PNG, base64-encoded, to an HTTP
//! function that fronts a vision API and answers with an optional `barcode`
//! plus whatever text it read.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::candidates::{best_text_candidate, clean_code};
use super::RecognitionError;

/// Recognizes a barcode number in one image (allows mocking for tests).
pub trait BarcodeRecognizer: Send + Sync {
    /// Return the digits read from `png_bytes`, or `None` when nothing was found.
    fn recognize(&self, png_bytes: &[u8]) -> Result<Option<String>, RecognitionError>;
}

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Full URL of the recognition function.
    pub endpoint: String,
    /// Sent as both `Authorization: Bearer` and `apikey` when present.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321/functions/v1/barcode-image-detector".into(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct RecognitionRequest<'a> {
    #[serde(rename = "imageBase64")]
    image_base64: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecognitionResponse {
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default, rename = "textContent")]
    pub text_content: Option<String>,
}

impl RecognitionResponse {
    /// Digits to validate: the detector's `barcode` when it is numeric,
    /// otherwise the best digit run in the recognized text.
    pub fn code(&self) -> Option<String> {
        if let Some(code) = self.barcode.as_deref().and_then(clean_code) {
            return Some(code);
        }
        self.text_content.as_deref().and_then(best_text_candidate)
    }
}

// ──────────────────────────────────────────────
// HttpRecognizer
// ──────────────────────────────────────────────

/// Blocking HTTP client for the recognition function.
pub struct HttpRecognizer {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpRecognizer {
    pub fn new(config: &RecognizerConfig) -> Result<Self, RecognitionError> {
        validate_endpoint(&config.endpoint)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl BarcodeRecognizer for HttpRecognizer {
    fn recognize(&self, png_bytes: &[u8]) -> Result<Option<String>, RecognitionError> {
        let _span = tracing::debug_span!("barcode_recognize", image_size = png_bytes.len()).entered();

        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes);
        let mut request = self.client.post(&self.endpoint).json(&RecognitionRequest {
            image_base64: &encoded,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                RecognitionError::Unreachable(self.endpoint.clone())
            } else if e.is_timeout() {
                RecognitionError::Timeout(self.timeout_secs)
            } else {
                RecognitionError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(RecognitionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RecognitionResponse = response
            .json()
            .map_err(|e| RecognitionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.code())
    }
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_endpoint(url: &str) -> Result<(), RecognitionError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| RecognitionError::InvalidEndpoint(url.to_string()))?;

    let host = rest.split(['/', ':', '?']).next().unwrap_or("");
    if host.is_empty() {
        return Err(RecognitionError::InvalidEndpoint(url.to_string()));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// MockRecognizer (testing)
// ──────────────────────────────────────────────

/// One scripted answer from [`MockRecognizer`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Code(String),
    Nothing,
    Fail,
}

/// Mock recognizer that replays scripted replies, then a fallback reply.
pub struct MockRecognizer {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    /// Never finds anything.
    pub fn empty() -> Self {
        Self::with_fallback(MockReply::Nothing)
    }

    /// Finds `code` on every call.
    pub fn always(code: &str) -> Self {
        Self::with_fallback(MockReply::Code(code.to_string()))
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self::with_fallback(MockReply::Fail)
    }

    fn with_fallback(fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Replies consumed in order before the fallback applies.
    pub fn with_script(self, replies: Vec<MockReply>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(replies);
        }
        self
    }

    /// Sleep this long on every call, like a slow network.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BarcodeRecognizer for MockRecognizer {
    fn recognize(&self, _png_bytes: &[u8]) -> Result<Option<String>, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Code(code) => Ok(Some(code)),
            MockReply::Nothing => Ok(None),
            MockReply::Fail => Err(RecognitionError::Network("mock recognizer failure".into())),
        }
    }
}
