use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigError;

use super::provider::{Basis, ProviderRecord, RawNutrients};
use super::serving::resolve_serving;
use super::types::{
    MacroMode, NormalizedNutrition, NutrientValues, PortionHint, ResolvedNutrition, Rounding,
    ServingSource,
};

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Serving mass when nothing on the record says otherwise.
    pub default_serving_grams: f64,
    /// Average mass of one counted item (cookie, bar, piece).
    pub grams_per_piece: f64,
    /// Grams per millilitre for liquids.
    pub ml_density: f64,
    pub kj_per_kcal: f64,
    /// Sodium fraction of table salt by mass.
    pub salt_to_sodium: f64,
    /// Plausible serving range for declared and label-derived masses.
    pub min_serving_grams: f64,
    pub max_serving_grams: f64,
    /// Tighter range for servings inferred from the calorie ratio.
    pub min_ratio_grams: f64,
    pub max_ratio_grams: f64,
    pub rounding: Rounding,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            default_serving_grams: 30.0,
            grams_per_piece: 25.0,
            ml_density: 1.0,
            kj_per_kcal: 4.184,
            salt_to_sodium: 0.393,
            min_serving_grams: 1.0,
            max_serving_grams: 500.0,
            min_ratio_grams: 10.0,
            max_ratio_grams: 300.0,
            rounding: Rounding::default(),
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("default_serving_grams", self.default_serving_grams),
            ("grams_per_piece", self.grams_per_piece),
            ("ml_density", self.ml_density),
            ("kj_per_kcal", self.kj_per_kcal),
            ("salt_to_sodium", self.salt_to_sodium),
            ("min_serving_grams", self.min_serving_grams),
            ("max_serving_grams", self.max_serving_grams),
            ("min_ratio_grams", self.min_ratio_grams),
            ("max_ratio_grams", self.max_ratio_grams),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "normalizer.{name} must be a positive number, got {value}"
                )));
            }
        }
        let ranges = [
            ("serving", self.min_serving_grams, self.max_serving_grams),
            ("ratio", self.min_ratio_grams, self.max_ratio_grams),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "normalizer.min_{name}_grams ({min}) exceeds max_{name}_grams ({max})"
                )));
            }
        }
        let r = &self.rounding;
        if r.calorie_decimals.max(r.sodium_decimals).max(r.macro_decimals) > 6 {
            return Err(ConfigError::Invalid(
                "normalizer.rounding supports at most 6 decimals".into(),
            ));
        }
        Ok(())
    }

    pub fn serving_in_range(&self, grams: f64) -> bool {
        (self.min_serving_grams..=self.max_serving_grams).contains(&grams)
    }

    pub fn ratio_in_range(&self, grams: f64) -> bool {
        (self.min_ratio_grams..=self.max_ratio_grams).contains(&grams)
    }
}

// ──────────────────────────────────────────────
// Normalizer
// ──────────────────────────────────────────────

/// Turns provider nutrition payloads into one canonical serving-scaled record.
///
/// Pure and deterministic: the same input always yields the same output, and
/// malformed input degrades to zeros rather than failing.
#[derive(Debug, Clone, Default)]
pub struct NutrientNormalizer {
    config: NormalizerConfig,
}

impl NutrientNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Canonical record with absent nutrients zero-filled.
    pub fn normalize(&self, raw: &Value) -> NormalizedNutrition {
        self.normalize_with_hint(raw, None)
    }

    /// Like [`normalize`](Self::normalize), with a caller-supplied portion.
    ///
    /// A positive hint replaces the resolved serving mass and forces scaling
    /// from the per-100g baseline. Without a per-100g baseline the hint is
    /// ignored, since provider serving figures refer to the provider's portion.
    pub fn normalize_with_hint(&self, raw: &Value, hint: Option<PortionHint>) -> NormalizedNutrition {
        let resolved = self.resolve_with_hint(raw, hint);
        NormalizedNutrition::from_resolved(&resolved, &self.config.rounding)
    }

    /// Serving resolution without rounding or zero-fill.
    pub fn resolve(&self, raw: &Value) -> ResolvedNutrition {
        self.resolve_with_hint(raw, None)
    }

    pub fn resolve_with_hint(&self, raw: &Value, hint: Option<PortionHint>) -> ResolvedNutrition {
        let record = ProviderRecord::new(raw);
        let per_100g = self.canonical(&record.raw_nutrients(Basis::Per100g));
        let provider_serving = self.canonical(&record.raw_nutrients(Basis::Serving));

        let serving = resolve_serving(
            &record,
            per_100g.calories,
            provider_serving.calories,
            &self.config,
        );

        let hint_grams = hint
            .map(|h| h.grams)
            .filter(|g| g.is_finite() && *g > 0.0);

        let resolved = match hint_grams {
            Some(grams) if per_100g.any() => ResolvedNutrition {
                serving_grams: grams,
                serving_source: ServingSource::Hint,
                macro_mode: MacroMode::ScaledFrom100g,
                serving: per_100g.scaled(grams / 100.0),
                per_100g,
            },
            _ if provider_serving.any() => {
                let zero_filled = provider_serving.missing_from(&per_100g);
                if !zero_filled.is_empty() {
                    tracing::debug!(
                        fields = ?zero_filled,
                        "Serving nutrients absent from provider; zero-filled"
                    );
                }
                ResolvedNutrition {
                    serving_grams: serving.grams,
                    serving_source: serving.source,
                    macro_mode: MacroMode::ServingProvider,
                    serving: provider_serving,
                    per_100g,
                }
            }
            _ => ResolvedNutrition {
                serving_grams: serving.grams,
                serving_source: serving.source,
                macro_mode: MacroMode::ScaledFrom100g,
                serving: per_100g.scaled(serving.grams / 100.0),
                per_100g,
            },
        };

        if hint_grams.is_some() && resolved.serving_source != ServingSource::Hint {
            tracing::debug!("Portion hint ignored: no per-100g baseline");
        }
        tracing::debug!(
            serving_grams = resolved.serving_grams,
            source = ?resolved.serving_source,
            mode = ?resolved.macro_mode,
            "Nutrition resolved"
        );

        resolved
    }

    /// Convert provider units to canonical ones (kcal, grams, sodium in mg).
    fn canonical(&self, raw: &RawNutrients) -> NutrientValues {
        let calories = raw
            .kcal
            .or_else(|| raw.kj.map(|kj| kj / self.config.kj_per_kcal));

        let sodium_mg = raw
            .sodium_mg
            .or_else(|| raw.sodium_g.map(|g| g * 1000.0))
            .or_else(|| {
                raw.salt_g
                    .map(|salt| salt * 1000.0 * self.config.salt_to_sodium)
            });

        NutrientValues {
            calories,
            protein_g: raw.protein_g,
            carbs_g: raw.carbs_g,
            fat_g: raw.fat_g,
            sat_fat_g: raw.sat_fat_g,
            fiber_g: raw.fiber_g,
            sugar_g: raw.sugar_g,
            sodium_mg,
        }
    }
}
