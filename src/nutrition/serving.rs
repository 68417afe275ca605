//! Serving mass resolution.
//!
//! Order of precedence: declared numeric grams, then the serving-size text
//! (mass, volume, pieces, household containers), then the calorie ratio
//! between per-serving and per-100g figures, then the configured default.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::normalizer::NormalizerConfig;
use super::provider::{coerce_number, ProviderRecord};
use super::types::ServingSource;

// Quantity: a mixed number like "1 1/2", a fraction like "2/3", or a decimal
// with '.' or ','.
const QTY: &str = r"(\d+\s+\d+\s*/\s*\d+|\d+\s*/\s*\d+|\d+(?:[.,]\d+)?)";

static GRAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){QTY}\s*(?:g|gr|grams?|grammes?)\b")).unwrap()
});
static KILOGRAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){QTY}\s*(?:kg|kilograms?)\b")).unwrap());
static POUNDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){QTY}\s*(?:lbs?|pounds?)\b")).unwrap());
static FLUID_OUNCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){QTY}\s*(?:fl\.?\s*oz|fluid\s+ounces?)\b")).unwrap());
static OUNCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){QTY}\s*(?:oz|ounces?)\b")).unwrap());
static MILLILITRES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){QTY}\s*(?:ml|millilit(?:er|re)s?)\b")).unwrap()
});
static CENTILITRES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){QTY}\s*(?:cl|centilit(?:er|re)s?)\b")).unwrap());
static LITRES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){QTY}\s*(?:l|lit(?:er|re)s?)\b")).unwrap());
static PIECES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:{QTY}\s*|\b)(?:pieces?|pcs?|items?|cookies?|crackers?|bars?)\b"
    ))
    .unwrap()
});
static CONTAINERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:{QTY}\s*|\b)(cups?|cans?|bottles?)\b")).unwrap()
});

const GRAMS_PER_KG: f64 = 1000.0;
const GRAMS_PER_LB: f64 = 453.592;
const GRAMS_PER_OZ: f64 = 28.3495;
const ML_PER_FL_OZ: f64 = 29.5735;
const ML_PER_CUP: f64 = 240.0;
const ML_PER_CAN: f64 = 355.0;
const ML_PER_BOTTLE: f64 = 500.0;

/// Resolved serving mass and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Serving {
    pub grams: f64,
    pub source: ServingSource,
}

/// Declared numeric gram fields, checked in order.
const DECLARED_KEYS: &[&str] = &["servingGrams", "serving_grams", "serving_size_g"];
const SERVING_TEXT_KEYS: &[&str] = &["serving_size", "servingSize", "serving"];

/// Resolve the serving mass for one record.
///
/// Candidates outside the configured plausibility range are dropped and the
/// next source is tried; the default always applies last.
pub fn resolve_serving(
    record: &ProviderRecord<'_>,
    kcal_per_100g: Option<f64>,
    kcal_serving: Option<f64>,
    config: &NormalizerConfig,
) -> Serving {
    let plausible = |serving: Serving| {
        let ok = config.serving_in_range(serving.grams);
        if !ok {
            tracing::debug!(
                grams = serving.grams,
                source = ?serving.source,
                "Serving candidate out of range, skipped"
            );
        }
        ok
    };

    if let Some(serving) = declared_grams(record).map(|grams| Serving {
        grams,
        source: ServingSource::Declared,
    }) {
        if plausible(serving) {
            return serving;
        }
    }

    for key in SERVING_TEXT_KEYS {
        let candidate = match record.get(key) {
            Some(Value::String(text)) => parse_serving_text(text, config),
            Some(value @ Value::Number(_)) => coerce_number(value)
                .filter(|g| *g > 0.0)
                .map(|grams| Serving {
                    grams,
                    source: ServingSource::Declared,
                }),
            _ => None,
        };
        if let Some(serving) = candidate.filter(|s| plausible(*s)) {
            return serving;
        }
    }

    if let (Some(per100), Some(serving)) = (kcal_per_100g, kcal_serving) {
        if per100 > 0.0 && serving > 0.0 {
            let ratio = Serving {
                grams: (100.0 * serving / per100).round(),
                source: ServingSource::Ratio,
            };
            if config.ratio_in_range(ratio.grams) && plausible(ratio) {
                return ratio;
            }
            tracing::debug!(grams = ratio.grams, "Calorie ratio serving implausible, skipped");
        }
    }

    Serving {
        grams: config.default_serving_grams,
        source: ServingSource::Default,
    }
}

fn declared_grams(record: &ProviderRecord<'_>) -> Option<f64> {
    let direct = DECLARED_KEYS
        .iter()
        .find_map(|key| record.number(key).filter(|g| *g > 0.0));
    if direct.is_some() {
        return direct;
    }

    // OpenFoodFacts: serving_quantity with an optional unit.
    let unit_is_grams = match record.text("serving_quantity_unit") {
        None => true,
        Some(unit) => matches!(unit.to_ascii_lowercase().as_str(), "g" | "gr" | "gram" | "grams"),
    };
    if unit_is_grams {
        record.number("serving_quantity").filter(|g| *g > 0.0)
    } else {
        None
    }
}

/// Parse free serving-size text ("2/3 cup (55 g)", "1 can (355 ml)", "2 cookies").
///
/// Mass wins over volume, volume over counts.
pub fn parse_serving_text(text: &str, config: &NormalizerConfig) -> Option<Serving> {
    let mass = [
        (&*GRAMS, 1.0),
        (&*KILOGRAMS, GRAMS_PER_KG),
        (&*POUNDS, GRAMS_PER_LB),
    ];
    for (re, factor) in mass {
        if let Some(qty) = first_quantity(re, text) {
            return positive(qty * factor, ServingSource::Label);
        }
    }

    // "fl oz" has to be tried before plain ounces.
    let volume = [
        (&*MILLILITRES, 1.0),
        (&*CENTILITRES, 10.0),
        (&*FLUID_OUNCES, ML_PER_FL_OZ),
        (&*LITRES, 1000.0),
    ];
    for (re, factor) in volume {
        if let Some(qty) = first_quantity(re, text) {
            return positive(qty * factor * config.ml_density, ServingSource::Volume);
        }
    }

    if let Some(qty) = first_quantity(&OUNCES, text) {
        return positive(qty * GRAMS_PER_OZ, ServingSource::Label);
    }

    if let Some(caps) = PIECES.captures(text) {
        let qty = match caps.get(1) {
            Some(m) => parse_quantity(m.as_str())?,
            None => 1.0,
        };
        return positive(qty * config.grams_per_piece, ServingSource::Pieces);
    }

    if let Some(caps) = CONTAINERS.captures(text) {
        let qty = match caps.get(1) {
            Some(m) => parse_quantity(m.as_str())?,
            None => 1.0,
        };
        let unit = caps.get(2)?.as_str().to_ascii_lowercase();
        let ml = if unit.starts_with("cup") {
            ML_PER_CUP
        } else if unit.starts_with("can") {
            ML_PER_CAN
        } else {
            ML_PER_BOTTLE
        };
        return positive(qty * ml * config.ml_density, ServingSource::Container);
    }

    None
}

fn first_quantity(re: &Regex, text: &str) -> Option<f64> {
    let caps = re.captures(text)?;
    parse_quantity(caps.get(1)?.as_str())
}

fn positive(grams: f64, source: ServingSource) -> Option<Serving> {
    (grams.is_finite() && grams > 0.0).then_some(Serving { grams, source })
}

/// "1 1/2", "2/3", "1.5", "2,5".
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some((num, den)) = raw.split_once('/') {
        let (whole, num) = match num.trim().rsplit_once(char::is_whitespace) {
            Some((whole, num)) => (whole.trim().parse::<f64>().ok()?, num),
            None => (0.0, num),
        };
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(whole + num / den);
    }
    raw.replace(',', ".").parse().ok()
}
