use serde::{Deserialize, Serialize};

/// Where the serving-level figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroMode {
    /// Provider declared per-serving values; only rounding applied.
    #[serde(rename = "SERVING_PROVIDER")]
    ServingProvider,
    /// Per-100g values scaled by `serving_grams / 100`.
    #[serde(rename = "SCALED_FROM_100G")]
    ScaledFrom100g,
}

/// How the serving mass was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingSource {
    /// Numeric gram field on the record.
    Declared,
    /// Mass parsed from the serving-size text ("2/3 cup (55 g)").
    Label,
    /// Volume in the serving text converted with the liquid density.
    Volume,
    /// Piece count × average piece weight.
    Pieces,
    /// Household container (cup, can, bottle) of known volume.
    Container,
    /// Inferred from per-serving vs per-100g calories.
    Ratio,
    /// Portion supplied by the caller.
    Hint,
    Default,
}

/// Who supplied a portion hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintSource {
    User,
    Ocr,
}

/// Caller-supplied portion that overrides the resolved serving mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortionHint {
    pub grams: f64,
    pub source: HintSource,
}

/// One set of nutrient amounts at a single granularity (per 100 g or per serving).
///
/// `None` means the provider did not say; zero-filling happens only when
/// converting to [`NormalizedNutrition`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientValues {
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub sat_fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
}

const FIELD_NAMES: [&str; 8] = [
    "calories",
    "protein_g",
    "carbs_g",
    "fat_g",
    "sat_fat_g",
    "fiber_g",
    "sugar_g",
    "sodium_mg",
];

impl NutrientValues {
    /// True when at least one nutrient is present.
    pub fn any(&self) -> bool {
        self.fields().iter().any(Option::is_some)
    }

    /// Multiply every present value by `factor`; absent values stay absent.
    pub fn scaled(&self, factor: f64) -> Self {
        let s = |v: Option<f64>| v.map(|x| x * factor);
        Self {
            calories: s(self.calories),
            protein_g: s(self.protein_g),
            carbs_g: s(self.carbs_g),
            fat_g: s(self.fat_g),
            sat_fat_g: s(self.sat_fat_g),
            fiber_g: s(self.fiber_g),
            sugar_g: s(self.sugar_g),
            sodium_mg: s(self.sodium_mg),
        }
    }

    /// Nutrients present in `baseline` but absent here.
    pub fn missing_from(&self, baseline: &NutrientValues) -> Vec<&'static str> {
        FIELD_NAMES
            .iter()
            .zip(self.fields().iter().zip(baseline.fields()))
            .filter(|(_, (own, other))| own.is_none() && other.is_some())
            .map(|(name, _)| *name)
            .collect()
    }

    fn fields(&self) -> [Option<f64>; 8] {
        [
            self.calories,
            self.protein_g,
            self.carbs_g,
            self.fat_g,
            self.sat_fat_g,
            self.fiber_g,
            self.sugar_g,
            self.sodium_mg,
        ]
    }
}

/// Normalizer output before rounding and zero-fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNutrition {
    pub serving_grams: f64,
    pub serving_source: ServingSource,
    pub macro_mode: MacroMode,
    /// Serving-level values, unrounded.
    pub serving: NutrientValues,
    pub per_100g: NutrientValues,
}

/// Canonical serving-scaled nutrition record.
///
/// Serving fields are rounded (calories and sodium to integers, gram macros to
/// one decimal). Per-100g fields are the provider baseline, unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNutrition {
    pub serving_grams: f64,
    pub serving_source: ServingSource,
    pub macro_mode: MacroMode,

    pub calories_serving: f64,
    pub protein_g_serving: f64,
    pub carbs_g_serving: f64,
    pub fat_g_serving: f64,
    pub sat_fat_g_serving: f64,
    pub fiber_g_serving: f64,
    pub sugar_g_serving: f64,
    pub sodium_mg_serving: f64,

    pub calories_per_100g: f64,
    pub protein_g_per_100g: f64,
    pub carbs_g_per_100g: f64,
    pub fat_g_per_100g: f64,
    pub sat_fat_g_per_100g: f64,
    pub fiber_g_per_100g: f64,
    pub sugar_g_per_100g: f64,
    pub sodium_mg_per_100g: f64,
}

/// Decimal places kept on serving-level figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rounding {
    pub calorie_decimals: u32,
    pub sodium_decimals: u32,
    pub macro_decimals: u32,
}

impl Default for Rounding {
    fn default() -> Self {
        Self {
            calorie_decimals: 0,
            sodium_decimals: 0,
            macro_decimals: 1,
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn fill(v: Option<f64>) -> f64 {
    v.unwrap_or(0.0).max(0.0)
}

impl NormalizedNutrition {
    /// Zero-fill and round a resolved record.
    pub fn from_resolved(resolved: &ResolvedNutrition, rounding: &Rounding) -> Self {
        let s = &resolved.serving;
        let p = &resolved.per_100g;
        let macro_g = |v: Option<f64>| round_to(fill(v), rounding.macro_decimals);

        Self {
            serving_grams: resolved.serving_grams,
            serving_source: resolved.serving_source,
            macro_mode: resolved.macro_mode,

            calories_serving: round_to(fill(s.calories), rounding.calorie_decimals),
            protein_g_serving: macro_g(s.protein_g),
            carbs_g_serving: macro_g(s.carbs_g),
            fat_g_serving: macro_g(s.fat_g),
            sat_fat_g_serving: macro_g(s.sat_fat_g),
            fiber_g_serving: macro_g(s.fiber_g),
            sugar_g_serving: macro_g(s.sugar_g),
            sodium_mg_serving: round_to(fill(s.sodium_mg), rounding.sodium_decimals),

            calories_per_100g: fill(p.calories),
            protein_g_per_100g: fill(p.protein_g),
            carbs_g_per_100g: fill(p.carbs_g),
            fat_g_per_100g: fill(p.fat_g),
            sat_fat_g_per_100g: fill(p.sat_fat_g),
            fiber_g_per_100g: fill(p.fiber_g),
            sugar_g_per_100g: fill(p.sugar_g),
            sodium_mg_per_100g: fill(p.sodium_mg),
        }
    }

    /// Re-derive serving figures for another portion from the per-100g baseline.
    ///
    /// Non-positive or non-finite `grams` leaves the record unchanged.
    pub fn for_portion(&self, grams: f64) -> Self {
        self.for_portion_rounded(grams, &Rounding::default())
    }

    pub fn for_portion_rounded(&self, grams: f64, rounding: &Rounding) -> Self {
        if !(grams.is_finite() && grams > 0.0) {
            return self.clone();
        }
        let per_100g = self.per_100g();
        let resolved = ResolvedNutrition {
            serving_grams: grams,
            serving_source: ServingSource::Hint,
            macro_mode: MacroMode::ScaledFrom100g,
            serving: per_100g.scaled(grams / 100.0),
            per_100g,
        };
        Self::from_resolved(&resolved, rounding)
    }

    /// Per-100g baseline as `NutrientValues` (all present).
    pub fn per_100g(&self) -> NutrientValues {
        NutrientValues {
            calories: Some(self.calories_per_100g),
            protein_g: Some(self.protein_g_per_100g),
            carbs_g: Some(self.carbs_g_per_100g),
            fat_g: Some(self.fat_g_per_100g),
            sat_fat_g: Some(self.sat_fat_g_per_100g),
            fiber_g: Some(self.fiber_g_per_100g),
            sugar_g: Some(self.sugar_g_per_100g),
            sodium_mg: Some(self.sodium_mg_per_100g),
        }
    }
}
