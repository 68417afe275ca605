//! Multi-pass barcode decoder.
//!
//! Walks the [`SearchPlan`] in order, rendering each candidate and asking the
//! recognizer for digits, and stops at the first checksum-valid code. A
//! wall-clock budget is checked before every attempt; an attempt already in
//! flight is never cancelled, so one slow request can overshoot the budget.
//!
//! Every failure (undecodable image, recognizer error, exhausted search,
//! budget) ends in the same place: a result with `code: None` and the
//! counters collected so far.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::checksum::{is_valid_upc_ean, normalized_forms, BarcodeFormat, CodeForms};
use super::recognizer::BarcodeRecognizer;
use super::render::{load_source, render_candidate};
use super::search::{Candidate, DecoderConfig, Polarity, SearchPlan};

// ──────────────────────────────────────────────
// Result types
// ──────────────────────────────────────────────

/// Why a decode call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeOutcome {
    Found,
    /// Every candidate was tried without a valid code.
    Exhausted,
    BudgetExceeded,
    ImageError,
    RecognitionError,
}

/// What one attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Found,
    NotFound,
    ChecksumFail,
    Error,
}

/// Diagnostics for a single candidate attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub crop: String,
    pub scale: f32,
    pub rotation: i32,
    pub inverted: bool,
    pub outcome: AttemptOutcome,
    /// Digits returned by the recognizer, valid or not.
    pub code: Option<String>,
    pub duration_ms: u64,
    /// Time since the decode call started, at the end of this attempt.
    pub elapsed_ms: u64,
}

/// Result of one decode call. `code` is `None` for every kind of failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeResult {
    pub code: Option<String>,
    pub format: Option<BarcodeFormat>,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub reason: DecodeOutcome,
    pub normalized: Option<CodeForms>,
    pub attempt_log: Vec<AttemptRecord>,
}

impl DecodeResult {
    pub fn is_found(&self) -> bool {
        self.code.is_some()
    }
}

// ──────────────────────────────────────────────
// BarcodeDecoder
// ──────────────────────────────────────────────

/// Converts a captured photo into a checksum-valid UPC/EAN code.
///
/// Stateless between calls: each `decode` builds its own counters.
pub struct BarcodeDecoder {
    recognizer: Arc<dyn BarcodeRecognizer>,
    config: DecoderConfig,
}

impl BarcodeDecoder {
    pub fn new(recognizer: Arc<dyn BarcodeRecognizer>, config: DecoderConfig) -> Self {
        Self { recognizer, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Search `image_bytes` for a barcode within the configured budget.
    pub fn decode(&self, image_bytes: &[u8]) -> DecodeResult {
        let _span = tracing::info_span!(
            "barcode_decode",
            image_size = image_bytes.len(),
            budget_ms = self.config.budget_ms,
        )
        .entered();
        let mut run = DecodeRun::start();

        let source = match load_source(image_bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "Barcode source image could not be loaded");
                return run.finish(DecodeOutcome::ImageError, None);
            }
        };

        let budget = self.config.budget();
        for candidate in SearchPlan::new(&self.config) {
            if run.elapsed() > budget {
                return run.finish(DecodeOutcome::BudgetExceeded, None);
            }

            let attempt_start = Instant::now();
            let rendered = match render_candidate(&source, &candidate) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, index = candidate.index, "Candidate rendering failed");
                    run.record(&candidate, AttemptOutcome::Error, None, attempt_start);
                    return run.finish(DecodeOutcome::ImageError, None);
                }
            };

            match self.recognizer.recognize(&rendered.png_bytes) {
                Err(e) => {
                    warn!(error = %e, index = candidate.index, "Recognition request failed");
                    run.record(&candidate, AttemptOutcome::Error, None, attempt_start);
                    return run.finish(DecodeOutcome::RecognitionError, None);
                }
                Ok(None) => {
                    run.record(&candidate, AttemptOutcome::NotFound, None, attempt_start);
                }
                Ok(Some(code)) if is_valid_upc_ean(&code) => {
                    run.record(&candidate, AttemptOutcome::Found, Some(code.clone()), attempt_start);
                    return run.finish(DecodeOutcome::Found, Some(code));
                }
                Ok(Some(code)) => {
                    debug!(code = %code, index = candidate.index, "Recognized digits failed checksum");
                    run.record(&candidate, AttemptOutcome::ChecksumFail, Some(code), attempt_start);
                }
            }
        }

        run.finish(DecodeOutcome::Exhausted, None)
    }
}

/// Per-call counters.
struct DecodeRun {
    start: Instant,
    log: Vec<AttemptRecord>,
}

impl DecodeRun {
    fn start() -> Self {
        Self {
            start: Instant::now(),
            log: Vec::new(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn record(
        &mut self,
        candidate: &Candidate<'_>,
        outcome: AttemptOutcome,
        code: Option<String>,
        attempt_start: Instant,
    ) {
        self.log.push(AttemptRecord {
            crop: candidate.crop.label.clone(),
            scale: candidate.scale,
            rotation: candidate.rotation,
            inverted: candidate.polarity == Polarity::Inverted,
            outcome,
            code,
            duration_ms: attempt_start.elapsed().as_millis() as u64,
            elapsed_ms: self.start.elapsed().as_millis() as u64,
        });
    }

    fn finish(self, reason: DecodeOutcome, code: Option<String>) -> DecodeResult {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let attempts = self.log.len() as u32;
        let format = code.as_deref().map(|c| BarcodeFormat::from_len(c.len()));
        let normalized = code.as_deref().map(normalized_forms);

        info!(
            found = code.is_some(),
            format = ?format,
            attempts,
            elapsed_ms,
            reason = ?reason,
            "Barcode decode finished"
        );

        DecodeResult {
            code,
            format,
            attempts,
            elapsed_ms,
            reason,
            normalized,
            attempt_log: self.log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::recognizer::{MockRecognizer, MockReply};
    use crate::barcode::render::encode_png;
    use crate::barcode::search::CropRegion;
    use image::{Rgb, RgbImage};

    fn test_photo() -> Vec<u8> {
        let mut img = RgbImage::from_pixel(40, 30, Rgb([255, 255, 255]));
        for x in (4..36).step_by(3) {
            for y in 8..22 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        encode_png(&img).unwrap()
    }

    fn decoder(mock: MockRecognizer, config: DecoderConfig) -> (BarcodeDecoder, Arc<MockRecognizer>) {
        let mock = Arc::new(mock);
        (BarcodeDecoder::new(mock.clone(), config), mock)
    }

    #[test]
    fn first_valid_code_returns_immediately() {
        let (d, mock) = decoder(MockRecognizer::always("036000291452"), DecoderConfig::default());
        let result = d.decode(&test_photo());

        assert_eq!(result.code.as_deref(), Some("036000291452"));
        assert_eq!(result.format, Some(BarcodeFormat::UpcA));
        assert_eq!(result.attempts, 1);
        assert_eq!(result.reason, DecodeOutcome::Found);
        assert_eq!(mock.calls(), 1);

        let forms = result.normalized.unwrap();
        assert_eq!(forms.ean13.as_deref(), Some("0036000291452"));
    }

    #[test]
    fn skips_misses_and_checksum_failures() {
        let mock = MockRecognizer::empty().with_script(vec![
            MockReply::Nothing,
            MockReply::Nothing,
            MockReply::Code("4006381333932".into()),
            MockReply::Nothing,
            MockReply::Code("4006381333931".into()),
        ]);
        let (d, _) = decoder(mock, DecoderConfig::default());
        let result = d.decode(&test_photo());

        assert_eq!(result.code.as_deref(), Some("4006381333931"));
        assert_eq!(result.format, Some(BarcodeFormat::Ean13));
        assert_eq!(result.attempts, 5);

        let outcomes: Vec<_> = result.attempt_log.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::NotFound,
                AttemptOutcome::NotFound,
                AttemptOutcome::ChecksumFail,
                AttemptOutcome::NotFound,
                AttemptOutcome::Found,
            ]
        );
        assert_eq!(result.attempt_log[2].code.as_deref(), Some("4006381333932"));
        // Second attempt is the inverted rendering of the first.
        assert!(!result.attempt_log[0].inverted);
        assert!(result.attempt_log[1].inverted);
        assert_eq!(result.attempt_log[2].rotation, 90);
    }

    #[test]
    fn exhausts_full_search_space() {
        let config = DecoderConfig::default().with_budget_ms(60_000);
        let total = config.search_space_len() as u32;
        let (d, mock) = decoder(MockRecognizer::empty(), config);
        let result = d.decode(&test_photo());

        assert!(result.code.is_none());
        assert!(result.format.is_none());
        assert_eq!(result.reason, DecodeOutcome::Exhausted);
        assert_eq!(result.attempts, total);
        assert_eq!(mock.calls(), total as usize);
    }

    #[test]
    fn elapsed_is_monotonic_across_attempts() {
        let config = DecoderConfig::default().with_budget_ms(60_000);
        let (d, _) = decoder(MockRecognizer::empty(), config);
        let result = d.decode(&test_photo());

        let elapsed: Vec<u64> = result.attempt_log.iter().map(|a| a.elapsed_ms).collect();
        assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
        assert!(result.elapsed_ms >= *elapsed.last().unwrap());
    }

    #[test]
    fn checksum_failures_never_count_as_found() {
        let config = DecoderConfig::default().with_budget_ms(60_000);
        let (d, _) = decoder(MockRecognizer::always("036000291453"), config);
        let result = d.decode(&test_photo());

        assert!(result.code.is_none());
        assert_eq!(result.reason, DecodeOutcome::Exhausted);
        assert!(result
            .attempt_log
            .iter()
            .all(|a| a.outcome == AttemptOutcome::ChecksumFail));
    }

    #[test]
    fn budget_stops_search_early() {
        let config = DecoderConfig::default().with_budget_ms(50);
        let total = config.search_space_len() as u32;
        let mock = MockRecognizer::empty().with_latency(Duration::from_millis(20));
        let (d, _) = decoder(mock, config);
        let result = d.decode(&test_photo());

        assert!(result.code.is_none());
        assert_eq!(result.reason, DecodeOutcome::BudgetExceeded);
        assert!(result.attempts >= 1);
        assert!(result.attempts < total);
        assert!(result.elapsed_ms >= 50);
    }

    #[test]
    fn recognizer_error_ends_decode() {
        let (d, mock) = decoder(MockRecognizer::failing(), DecoderConfig::default());
        let result = d.decode(&test_photo());

        assert!(result.code.is_none());
        assert_eq!(result.reason, DecodeOutcome::RecognitionError);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.attempt_log[0].outcome, AttemptOutcome::Error);
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn undecodable_image_makes_no_attempts() {
        let (d, mock) = decoder(MockRecognizer::always("036000291452"), DecoderConfig::default());
        let result = d.decode(b"\x89PNG not really");

        assert!(result.code.is_none());
        assert_eq!(result.reason, DecodeOutcome::ImageError);
        assert_eq!(result.attempts, 0);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn attempts_bounded_by_custom_search_space() {
        let config = DecoderConfig {
            crops: vec![CropRegion::full()],
            scales: vec![1.0, 0.5],
            rotations: vec![0, 90],
            polarities: vec![Polarity::Normal],
            budget_ms: 60_000,
        };
        let (d, _) = decoder(MockRecognizer::empty(), config);
        let result = d.decode(&test_photo());
        assert_eq!(result.attempts, 4);
        assert_eq!(result.reason, DecodeOutcome::Exhausted);
    }

    #[test]
    fn result_serializes_camel_case() {
        let (d, _) = decoder(MockRecognizer::always("96385074"), DecoderConfig::default());
        let json = serde_json::to_value(d.decode(&test_photo())).unwrap();
        assert_eq!(json["code"], "96385074");
        assert_eq!(json["format"], "EAN-8");
        assert_eq!(json["attempts"], 1);
        assert!(json["elapsedMs"].is_u64());
        assert_eq!(json["reason"], "found");
        assert_eq!(json["attemptLog"][0]["outcome"], "found");
    }
}
