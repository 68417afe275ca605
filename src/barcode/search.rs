//! Search space for the multi-pass decoder.
//!
//! A decode walks crop × scale × rotation × polarity in a fixed nested order,
//! crop outermost and polarity innermost. `SearchPlan` yields that product one
//! candidate at a time so the decoder can check its time budget between yields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Fractional rectangle of the source image, in `[0, 1]` on both axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    pub fn new(label: &str, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            label: label.to_string(),
            x,
            y,
            width,
            height,
        }
    }

    /// Central region of interest, where users usually aim the camera.
    pub fn center() -> Self {
        Self::new("center", 0.1, 0.25, 0.8, 0.5)
    }

    pub fn top() -> Self {
        Self::new("top", 0.0, 0.0, 1.0, 0.4)
    }

    pub fn bottom() -> Self {
        Self::new("bottom", 0.0, 0.6, 1.0, 0.4)
    }

    pub fn full() -> Self {
        Self::new("full", 0.0, 0.0, 1.0, 1.0)
    }

    fn is_within_unit_square(&self) -> bool {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0 + f32::EPSILON
            && self.y + self.height <= 1.0 + f32::EPSILON
    }
}

/// Luminance polarity of a rendered candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Normal,
    /// 255 − value on every channel, for light-on-dark printing.
    Inverted,
}

/// Decoder tunables. Defaults reproduce the production search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub crops: Vec<CropRegion>,
    pub scales: Vec<f32>,
    /// Clockwise degrees. Quarter turns are exact; anything else is a tilt.
    pub rotations: Vec<i32>,
    pub polarities: Vec<Polarity>,
    /// Wall-clock budget; no new attempt starts once it is exceeded.
    pub budget_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            crops: vec![CropRegion::center(), CropRegion::top(), CropRegion::bottom()],
            scales: vec![1.0, 0.75, 0.5],
            rotations: vec![0, 90, 180, 270, 8, -8],
            polarities: vec![Polarity::Normal, Polarity::Inverted],
            budget_ms: 1200,
        }
    }
}

impl DecoderConfig {
    /// Same search space with a different budget. Handy for tests.
    pub fn with_budget_ms(mut self, budget_ms: u64) -> Self {
        self.budget_ms = budget_ms;
        self
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    /// Number of candidates in the full search space.
    pub fn search_space_len(&self) -> usize {
        self.crops.len() * self.scales.len() * self.rotations.len() * self.polarities.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crops.is_empty()
            || self.scales.is_empty()
            || self.rotations.is_empty()
            || self.polarities.is_empty()
        {
            return Err(ConfigError::Invalid(
                "decoder search lists must not be empty".into(),
            ));
        }
        if let Some(s) = self.scales.iter().find(|s| !(**s > 0.0 && **s <= 1.0)) {
            return Err(ConfigError::Invalid(format!(
                "scale {s} is outside (0, 1]"
            )));
        }
        if let Some(c) = self.crops.iter().find(|c| !c.is_within_unit_square()) {
            return Err(ConfigError::Invalid(format!(
                "crop '{}' does not fit in the unit square",
                c.label
            )));
        }
        Ok(())
    }
}

/// One point of the search space.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    /// Position in iteration order, starting at 0.
    pub index: usize,
    pub crop: &'a CropRegion,
    pub scale: f32,
    pub rotation: i32,
    pub polarity: Polarity,
}

/// Iterator over the Cartesian product of a `DecoderConfig`'s search lists.
pub struct SearchPlan<'a> {
    config: &'a DecoderConfig,
    next: usize,
    total: usize,
}

impl<'a> SearchPlan<'a> {
    pub fn new(config: &'a DecoderConfig) -> Self {
        Self {
            config,
            next: 0,
            total: config.search_space_len(),
        }
    }
}

impl<'a> Iterator for SearchPlan<'a> {
    type Item = Candidate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;

        // Mixed-radix decomposition, polarity as the fastest digit.
        let c = self.config;
        let np = c.polarities.len();
        let nr = c.rotations.len();
        let ns = c.scales.len();

        let polarity = c.polarities[index % np];
        let rotation = c.rotations[(index / np) % nr];
        let scale = c.scales[(index / (np * nr)) % ns];
        let crop = &c.crops[index / (np * nr * ns)];

        Some(Candidate {
            index,
            crop,
            scale,
            rotation,
            polarity,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SearchPlan<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_search_space_size() {
        let config = DecoderConfig::default();
        assert_eq!(config.search_space_len(), 3 * 3 * 6 * 2);
        assert_eq!(SearchPlan::new(&config).count(), 108);
        assert_eq!(config.budget_ms, 1200);
    }

    #[test]
    fn plan_order_is_crop_outermost_polarity_innermost() {
        let config = DecoderConfig::default();
        let plan: Vec<_> = SearchPlan::new(&config).collect();

        assert_eq!(plan[0].crop.label, "center");
        assert_eq!(plan[0].scale, 1.0);
        assert_eq!(plan[0].rotation, 0);
        assert_eq!(plan[0].polarity, Polarity::Normal);

        assert_eq!(plan[1].polarity, Polarity::Inverted);
        assert_eq!(plan[1].rotation, 0);

        assert_eq!(plan[2].rotation, 90);
        assert_eq!(plan[2].polarity, Polarity::Normal);

        // 6 rotations × 2 polarities per scale
        assert_eq!(plan[12].scale, 0.75);
        assert_eq!(plan[12].crop.label, "center");

        // 3 scales per crop
        assert_eq!(plan[36].crop.label, "top");
        assert_eq!(plan[72].crop.label, "bottom");

        let last = plan.last().unwrap();
        assert_eq!(last.crop.label, "bottom");
        assert_eq!(last.scale, 0.5);
        assert_eq!(last.rotation, -8);
        assert_eq!(last.polarity, Polarity::Inverted);
    }

    #[test]
    fn indices_are_sequential() {
        let config = DecoderConfig::default();
        for (i, cand) in SearchPlan::new(&config).enumerate() {
            assert_eq!(cand.index, i);
        }
    }

    #[test]
    fn plan_covers_every_combination_once() {
        let config = DecoderConfig::default();
        let mut seen = std::collections::HashSet::new();
        for cand in SearchPlan::new(&config) {
            let key = (
                cand.crop.label.clone(),
                (cand.scale * 100.0) as i32,
                cand.rotation,
                cand.polarity,
            );
            assert!(seen.insert(key));
        }
        assert_eq!(seen.len(), 108);
    }

    #[test]
    fn size_hint_tracks_progress() {
        let config = DecoderConfig::default();
        let mut plan = SearchPlan::new(&config);
        assert_eq!(plan.len(), 108);
        plan.next();
        plan.next();
        assert_eq!(plan.len(), 106);
    }

    #[test]
    fn empty_list_yields_nothing_and_fails_validation() {
        let config = DecoderConfig {
            polarities: vec![],
            ..DecoderConfig::default()
        };
        assert_eq!(SearchPlan::new(&config).count(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_bad_scale_and_crop() {
        let bad_scale = DecoderConfig {
            scales: vec![1.0, 1.5],
            ..DecoderConfig::default()
        };
        assert!(bad_scale.validate().is_err());

        let bad_crop = DecoderConfig {
            crops: vec![CropRegion::new("spill", 0.5, 0.0, 0.8, 1.0)],
            ..DecoderConfig::default()
        };
        assert!(bad_crop.validate().is_err());

        assert!(DecoderConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: DecoderConfig = serde_json::from_str(r#"{"budget_ms": 50}"#).unwrap();
        assert_eq!(config.budget_ms, 50);
        assert_eq!(config.rotations, vec![0, 90, 180, 270, 8, -8]);
        assert_eq!(config.polarities, vec![Polarity::Normal, Polarity::Inverted]);
    }
}
