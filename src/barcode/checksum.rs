//! UPC/EAN/GTIN check-digit validation and format naming.
//!
//! All four accepted lengths use the GS1 mod-10 scheme, weighted from the
//! right: the digit immediately left of the check digit has weight 3, the next
//! weight 1, alternating. For EAN-13 that is weight 1 on even (0-indexed)
//! positions; for EAN-8 it is weight 3 on even positions.

use serde::{Deserialize, Serialize};

/// Barcode lengths accepted by [`is_valid_upc_ean`].
const ACCEPTED_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Symbology inferred from the digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "EAN-14")]
    Ean14,
    Unknown,
}

impl BarcodeFormat {
    pub fn from_len(len: usize) -> Self {
        match len {
            8 => Self::Ean8,
            12 => Self::UpcA,
            13 => Self::Ean13,
            14 => Self::Ean14,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ean8 => "EAN-8",
            Self::UpcA => "UPC-A",
            Self::Ean13 => "EAN-13",
            Self::Ean14 => "EAN-14",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format name for a code, decided by length alone.
pub fn upc_format(code: &str) -> &'static str {
    BarcodeFormat::from_len(code.len()).as_str()
}

/// Compute the GS1 check digit for a body of digits (everything but the check digit).
///
/// Returns `None` if the body is empty or contains a non-digit.
pub fn check_digit(body: &str) -> Option<u8> {
    if body.is_empty() {
        return None;
    }

    let mut sum = 0u32;
    for (from_right, ch) in body.chars().rev().enumerate() {
        let d = ch.to_digit(10)?;
        sum += if from_right % 2 == 0 { d * 3 } else { d };
    }

    Some(((10 - (sum % 10)) % 10) as u8)
}

/// Validate a UPC-A, EAN-8, EAN-13 or GTIN-14 string including its check digit.
pub fn is_valid_upc_ean(code: &str) -> bool {
    if !ACCEPTED_LENGTHS.contains(&code.len()) || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let (body, last) = code.split_at(code.len() - 1);
    let expected = match check_digit(body) {
        Some(d) => d,
        None => return false,
    };

    last.as_bytes()[0] - b'0' == expected
}

/// UPC-A / EAN-13 spellings of the same product code.
///
/// Product lookups are keyed inconsistently across providers, so a found code
/// is offered in both forms where one converts to the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeForms {
    pub upca: Option<String>,
    pub ean13: Option<String>,
}

/// Derive UPC-A / EAN-13 forms for a checksum-valid code.
pub fn normalized_forms(code: &str) -> CodeForms {
    match code.len() {
        12 => CodeForms {
            upca: Some(code.to_string()),
            ean13: Some(format!("0{code}")),
        },
        13 => CodeForms {
            upca: code.strip_prefix('0').map(str::to_string),
            ean13: Some(code.to_string()),
        },
        _ => CodeForms::default(),
    }
}
