//! Per-serving health flags and a coarse 0–100 score.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::NormalizedNutrition;

static ARTIFICIAL_COLORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(red\s?40|allura\s?red|yellow\s?5|tartrazine|yellow\s?6|sunset\s?yellow|blue\s?1|blue\s?2|green\s?3)\b").unwrap()
});
static PRESERVATIVES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(bha|bht|tbhq|sodium\s+benzoate|potassium\s+sorbate)\b").unwrap()
});
static SWEETENERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(aspartame|acesulfame\s*-?\s*k|sucralose|saccharin)\b").unwrap()
});
static WHOLE_GRAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhole[\s-]+grains?\b").unwrap());

const SUGAR_WARNING_G: f64 = 18.0;
const SUGAR_DANGER_G: f64 = 25.0;
const SODIUM_WARNING_MG: f64 = 800.0;
const SODIUM_DANGER_MG: f64 = 1200.0;
const LOW_SODIUM_MG: f64 = 140.0;
const WHOLE_GRAIN_MAX_SUGAR_G: f64 = 10.0;

const BASE_SCORE: i32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagLevel {
    Danger,
    Warning,
    Ok,
}

impl FlagLevel {
    fn score_delta(self) -> i32 {
        match self {
            FlagLevel::Danger => -20,
            FlagLevel::Warning => -10,
            FlagLevel::Ok => 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthFlag {
    pub id: String,
    pub level: FlagLevel,
    pub label: String,
    pub details: String,
}

impl HealthFlag {
    fn new(id: &str, level: FlagLevel, label: &str, details: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            level,
            label: label.to_string(),
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `None` when the record has no calorie, sugar or sodium data.
    pub score: Option<u8>,
    pub flags: Vec<HealthFlag>,
}

/// Assess serving-level nutrition plus the ingredient text.
pub fn assess_health(nutrition: &NormalizedNutrition, ingredients_text: &str) -> HealthReport {
    let sugar = nutrition.sugar_g_serving;
    let sodium = nutrition.sodium_mg_serving;
    let mut flags = Vec::new();

    if sugar >= SUGAR_WARNING_G {
        let level = if sugar >= SUGAR_DANGER_G {
            FlagLevel::Danger
        } else {
            FlagLevel::Warning
        };
        flags.push(HealthFlag::new(
            "high_sugar",
            level,
            "High Sugar",
            format!("{sugar}g sugar per serving"),
        ));
    }

    if ARTIFICIAL_COLORS.is_match(ingredients_text) {
        flags.push(HealthFlag::new(
            "artificial_colors",
            FlagLevel::Warning,
            "Artificial Colors",
            "Contains Red 40, Yellow 5/6, Blue 1, or other artificial colors",
        ));
    }

    if PRESERVATIVES.is_match(ingredients_text) {
        flags.push(HealthFlag::new(
            "preservatives",
            FlagLevel::Warning,
            "Preservatives of Concern",
            "Contains BHA, BHT, TBHQ, or other concerning preservatives",
        ));
    }

    if SWEETENERS.is_match(ingredients_text) {
        flags.push(HealthFlag::new(
            "artificial_sweeteners",
            FlagLevel::Warning,
            "Artificial Sweeteners",
            "Contains aspartame, sucralose, or other artificial sweeteners",
        ));
    }

    if sodium > SODIUM_WARNING_MG {
        let level = if sodium > SODIUM_DANGER_MG {
            FlagLevel::Danger
        } else {
            FlagLevel::Warning
        };
        flags.push(HealthFlag::new(
            "high_sodium",
            level,
            "High Sodium",
            format!("{sodium}mg sodium per serving"),
        ));
    }

    if WHOLE_GRAIN.is_match(ingredients_text) && sugar < WHOLE_GRAIN_MAX_SUGAR_G {
        flags.push(HealthFlag::new(
            "whole_grains",
            FlagLevel::Ok,
            "Whole Grains",
            "Contains whole grain ingredients",
        ));
    }

    if sodium > 0.0 && sodium < LOW_SODIUM_MG {
        flags.push(HealthFlag::new(
            "low_sodium",
            FlagLevel::Ok,
            "Low Sodium",
            "Low in sodium",
        ));
    }

    let has_data = nutrition.calories_serving > 0.0 || sugar > 0.0 || sodium > 0.0;
    let score = has_data.then(|| {
        let total = flags
            .iter()
            .fold(BASE_SCORE, |acc, flag| acc + flag.level.score_delta());
        total.clamp(0, 100) as u8
    });

    tracing::debug!(score = ?score, flags = flags.len(), "Health assessed");

    HealthReport { score, flags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::NutrientNormalizer;
    use serde_json::json;

    fn serving(calories: f64, sugar: f64, sodium: f64) -> NormalizedNutrition {
        NutrientNormalizer::default().normalize(&json!({
            "serving_grams": 100,
            "nutriments": {
                "energy-kcal_100g": calories,
                "sugars_100g": sugar,
                "sodium_mg_100g": sodium
            }
        }))
    }

    fn ids(report: &HealthReport) -> Vec<&str> {
        report.flags.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn no_data_means_no_score() {
        let report = assess_health(&serving(0.0, 0.0, 0.0), "");
        assert_eq!(report.score, None);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn neutral_product_scores_base() {
        let report = assess_health(&serving(150.0, 5.0, 300.0), "oats, water");
        assert!(report.flags.is_empty());
        assert_eq!(report.score, Some(70));
    }

    #[test]
    fn sugar_thresholds() {
        let warn = assess_health(&serving(200.0, 18.0, 300.0), "");
        assert_eq!(warn.flags[0].level, FlagLevel::Warning);
        assert_eq!(warn.score, Some(60));

        let danger = assess_health(&serving(200.0, 25.0, 300.0), "");
        assert_eq!(danger.flags[0].level, FlagLevel::Danger);
        assert_eq!(danger.score, Some(50));

        let below = assess_health(&serving(200.0, 17.9, 300.0), "");
        assert!(below.flags.is_empty());
    }

    #[test]
    fn sodium_thresholds_are_strict() {
        assert!(assess_health(&serving(100.0, 0.0, 800.0), "").flags.is_empty());
        let warn = assess_health(&serving(100.0, 0.0, 801.0), "");
        assert_eq!(ids(&warn), vec!["high_sodium"]);
        assert_eq!(warn.flags[0].level, FlagLevel::Warning);
        let danger = assess_health(&serving(100.0, 0.0, 1201.0), "");
        assert_eq!(danger.flags[0].level, FlagLevel::Danger);
    }

    #[test]
    fn ingredient_additives() {
        let text = "Sugar, Red 40, BHT, Sucralose";
        let report = assess_health(&serving(100.0, 5.0, 300.0), text);
        assert_eq!(
            ids(&report),
            vec!["artificial_colors", "preservatives", "artificial_sweeteners"]
        );
        assert_eq!(report.score, Some(40));
    }

    #[test]
    fn preservative_match_needs_whole_word() {
        let report = assess_health(&serving(100.0, 5.0, 300.0), "bhakti masala");
        assert!(report.flags.is_empty());
    }

    #[test]
    fn positive_flags() {
        let report = assess_health(&serving(120.0, 4.0, 90.0), "Whole grain oats, salt");
        assert_eq!(ids(&report), vec!["whole_grains", "low_sodium"]);
        assert_eq!(report.score, Some(90));

        let sweet = assess_health(&serving(120.0, 12.0, 300.0), "whole grain wheat");
        assert!(sweet.flags.is_empty());
    }

    #[test]
    fn score_clamped_to_zero() {
        let text = "red 40, bha, aspartame";
        let report = assess_health(&serving(500.0, 30.0, 2000.0), text);
        assert_eq!(report.flags.len(), 5);
        assert_eq!(report.score, Some(0));
    }

    #[test]
    fn flags_serialize_lowercase_levels() {
        let report = assess_health(&serving(100.0, 30.0, 300.0), "");
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["flags"][0]["level"], "danger");
        assert_eq!(v["score"], 50);
    }
}
