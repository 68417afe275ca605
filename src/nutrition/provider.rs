//! Reading heterogeneous food-provider payloads.
//!
//! Providers disagree on shape: OpenFoodFacts nests everything under
//! `product` with a `nutriments` table, other sources send a `nutrition`
//! table or a flat record. Nutrient keys carry a `_100g` or `_serving`
//! suffix. Values show up as JSON numbers or as numeric strings.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").unwrap());

/// Granularity a nutrient key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Per100g,
    Serving,
}

impl Basis {
    fn suffix(self) -> &'static str {
        match self {
            Basis::Per100g => "_100g",
            Basis::Serving => "_serving",
        }
    }
}

// Key stems, tried in order.
const KCAL_KEYS: &[&str] = &["energy-kcal", "energy_kcal"];
/// OpenFoodFacts' bare `energy_*` is kilojoules.
const KJ_KEYS: &[&str] = &["energy-kj", "energy_kj", "energy"];
const PROTEIN_KEYS: &[&str] = &["proteins", "protein"];
const CARB_KEYS: &[&str] = &["carbohydrates", "carbs"];
const FAT_KEYS: &[&str] = &["fat"];
const SAT_FAT_KEYS: &[&str] = &["saturated-fat", "saturated_fat"];
const FIBER_KEYS: &[&str] = &["fiber", "fibre"];
const SUGAR_KEYS: &[&str] = &["sugars", "sugar"];
/// Grams, OpenFoodFacts convention.
const SODIUM_G_KEYS: &[&str] = &["sodium"];
const SODIUM_MG_KEYS: &[&str] = &["sodium_mg", "sodium-mg"];
const SALT_KEYS: &[&str] = &["salt"];

/// Nutrients exactly as the provider stated them, in the provider's units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawNutrients {
    pub kcal: Option<f64>,
    pub kj: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub sat_fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub salt_g: Option<f64>,
}

/// Read-only view over one provider record.
pub struct ProviderRecord<'a> {
    root: &'a Value,
    tables: Vec<&'a Map<String, Value>>,
}

impl<'a> ProviderRecord<'a> {
    pub fn new(raw: &'a Value) -> Self {
        let root = match raw.get("product") {
            Some(product) if product.is_object() => product,
            _ => raw,
        };

        // Nutrient tables first, then the record itself for flat payloads.
        let mut tables = Vec::new();
        for key in ["nutriments", "nutrition"] {
            if let Some(Value::Object(map)) = root.get(key) {
                tables.push(map);
            }
        }
        if let Value::Object(map) = root {
            tables.push(map);
        }

        Self { root, tables }
    }

    /// Top-level numeric field.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.root.get(key).and_then(coerce_number)
    }

    /// Top-level non-empty string field.
    pub fn text(&self, key: &str) -> Option<&'a str> {
        self.root
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Raw top-level value.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.root.get(key)
    }

    /// First present nutrient among `stems` at `basis`.
    pub fn nutrient(&self, stems: &[&str], basis: Basis) -> Option<f64> {
        let suffix = basis.suffix();
        self.tables.iter().find_map(|table| {
            stems
                .iter()
                .find_map(|stem| table.get(&format!("{stem}{suffix}")).and_then(coerce_number))
        })
    }

    pub fn raw_nutrients(&self, basis: Basis) -> RawNutrients {
        RawNutrients {
            kcal: self.nutrient(KCAL_KEYS, basis),
            kj: self.nutrient(KJ_KEYS, basis),
            protein_g: self.nutrient(PROTEIN_KEYS, basis),
            carbs_g: self.nutrient(CARB_KEYS, basis),
            fat_g: self.nutrient(FAT_KEYS, basis),
            sat_fat_g: self.nutrient(SAT_FAT_KEYS, basis),
            fiber_g: self.nutrient(FIBER_KEYS, basis),
            sugar_g: self.nutrient(SUGAR_KEYS, basis),
            sodium_g: self.nutrient(SODIUM_G_KEYS, basis),
            sodium_mg: self.nutrient(SODIUM_MG_KEYS, basis),
            salt_g: self.nutrient(SALT_KEYS, basis),
        }
    }

    /// Ingredient list as display text, with locale fallbacks.
    ///
    /// Falls back to joining a structured `ingredients` array.
    pub fn ingredients_text(&self) -> String {
        for key in [
            "ingredients_text_en",
            "ingredients_text",
            "ingredients_text_es",
            "ingredients_text_fr",
        ] {
            if let Some(text) = self.text(key) {
                return text.to_string();
            }
        }

        match self.root.get("ingredients") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(o) => o
                        .get("text")
                        .or_else(|| o.get("id"))
                        .and_then(Value::as_str),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        }
    }
}

/// Interpret a JSON value as a finite number.
///
/// Strings are accepted when they start with a number (`"12.5"`, `"12.5 g"`).
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let caps = LEADING_NUMBER.captures(s)?;
            caps.get(1)?.as_str().parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}
