//! Nutrient normalization.
//!
//! Provider payloads (OpenFoodFacts, enrichment services, manual entries)
//! come in mixed granularities: per 100 g, per serving, or both. This module
//! resolves a serving mass and produces one canonical serving-scaled record
//! while keeping the per-100g baseline for later portion changes.

pub mod health;
pub mod normalizer;
pub mod provider;
pub mod serving;
pub mod types;

pub use health::{assess_health, FlagLevel, HealthFlag, HealthReport};
pub use normalizer::{NormalizerConfig, NutrientNormalizer};
pub use provider::{Basis, ProviderRecord};
pub use serving::{parse_serving_text, resolve_serving, Serving};
pub use types::*;
