//! Barcode candidates from recognizer output.
//!
//! The recognition service answers with a `barcode` field when its barcode
//! detector fires, and otherwise only with the free text it read off the
//! label. Both paths end here.

use std::sync::LazyLock;

use regex::Regex;

use super::checksum::is_valid_upc_ean;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9]{8,14}\b").unwrap());

/// A digit run found in free text, with its ranking score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCandidate {
    pub value: String,
    pub position: usize,
    pub score: u32,
}

/// Strip the separators printers put between barcode digit groups.
///
/// `"0 36000 29145 2"` and `"036000-291452"` both become `"036000291452"`.
/// Returns `None` when anything other than digits remains.
pub fn clean_code(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

/// Score every 8–14 digit run in `text`, best first.
///
/// Standard lengths (8/12/13/14) get +5, UPC-A/EAN-13 lengths a further +3,
/// and a run whose check digit verifies gets +4. Ties keep text order.
pub fn score_text_candidates(text: &str) -> Vec<TextCandidate> {
    let mut candidates: Vec<TextCandidate> = DIGIT_RUN
        .find_iter(text)
        .map(|m| {
            let value = m.as_str();
            let mut score = 0;
            if matches!(value.len(), 8 | 12 | 13 | 14) {
                score += 5;
                if matches!(value.len(), 12 | 13) {
                    score += 3;
                }
            }
            if is_valid_upc_ean(value) {
                score += 4;
            }
            TextCandidate {
                value: value.to_string(),
                position: m.start(),
                score,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

/// Best digit run in free text, if any.
pub fn best_text_candidate(text: &str) -> Option<String> {
    score_text_candidates(text).into_iter().next().map(|c| c.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_code_strips_spaces_and_hyphens() {
        assert_eq!(clean_code("0 36000 29145 2").as_deref(), Some("036000291452"));
        assert_eq!(clean_code("036000-291452").as_deref(), Some("036000291452"));
    }

    #[test]
    fn clean_code_rejects_letters_and_empty() {
        assert_eq!(clean_code("ABC123"), None);
        assert_eq!(clean_code("  "), None);
        assert_eq!(clean_code(""), None);
    }

    #[test]
    fn no_runs_in_plain_text() {
        assert!(score_text_candidates("Organic rolled oats, 500 g").is_empty());
        assert_eq!(best_text_candidate("net wt 12 oz"), None);
    }

    #[test]
    fn upca_length_outranks_nonstandard_length() {
        let text = "LOT 1234567890 BEST BY 2026 UPC 036000291452";
        let ranked = score_text_candidates(text);
        assert_eq!(ranked[0].value, "036000291452");
        assert_eq!(ranked[0].score, 12);
        assert_eq!(ranked[1].value, "1234567890");
        assert_eq!(ranked[1].score, 0);
    }

    #[test]
    fn checksum_valid_run_wins_tie() {
        // Both 13 digits; only the second verifies.
        let text = "ref 4006381333932 ean 4006381333931";
        assert_eq!(best_text_candidate(text).as_deref(), Some("4006381333931"));
    }

    #[test]
    fn ties_keep_text_order() {
        let text = "11111111 22222222";
        let ranked = score_text_candidates(text);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].position, 0);
    }

    #[test]
    fn runs_longer_than_fourteen_ignored() {
        assert!(score_text_candidates("123456789012345678").is_empty());
    }
}
