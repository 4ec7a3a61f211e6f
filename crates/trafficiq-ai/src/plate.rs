//! Deterministic plate extraction.

use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use trafficiq_core::ids::{digest_word, sha256};
use trafficiq_core::{
    BackendError, ImageCondition, InputError, PlateExtractor, PlateResult, validate_identifier,
};

use crate::catalog::PLATE_TEMPLATES;
use crate::predictor::rescale;

/// Below this confidence the plate is reported as unresolved.
pub const PLATE_READ_FLOOR: f64 = 0.30;

pub const PLATE_CONFIDENCE_MIN: f64 = 0.40;
pub const PLATE_CONFIDENCE_MAX: f64 = 0.98;

const PLATE_SALT: &str = "#plate";
const TEMPLATE_AT: usize = 0;
const CHARS_AT: usize = 4;
const CONFIDENCE_AT: usize = 24;

/// Read-quality penalties applied by the extractor itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatePenalties {
    pub night: f64,
    pub blur: f64,
    pub rain: f64,
}

impl Default for PlatePenalties {
    fn default() -> Self {
        Self {
            night: 0.20,
            blur: 0.15,
            rain: 0.10,
        }
    }
}

impl PlatePenalties {
    pub fn for_condition(&self, condition: ImageCondition) -> f64 {
        match condition {
            ImageCondition::Night => self.night,
            ImageCondition::Blur => self.blur,
            ImageCondition::Rain => self.rain,
            ImageCondition::Clear | ImageCondition::LowRes => 0.0,
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let penalties: Self = serde_json::from_str(json).context("parsing plate penalties JSON")?;
        penalties.validate()?;
        Ok(penalties)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading plate penalties {}", path.display()))?;
        let penalties = Self::from_json_str(&json)
            .with_context(|| format!("loading plate penalties {}", path.display()))?;
        tracing::info!(path = %path.display(), ?penalties, "plate penalties loaded");
        Ok(penalties)
    }

    /// Every penalty must lie in [0, 1].
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [("night", self.night), ("blur", self.blur), ("rain", self.rain)] {
            if !(0.0..=1.0).contains(&value) {
                bail!("plate penalty {name} is {value}, outside [0, 1]");
            }
        }
        Ok(())
    }
}

fn render_plate(template: &str, digest: &[u8; 32]) -> String {
    template
        .bytes()
        .enumerate()
        .map(|(i, slot)| {
            let b = digest[(CHARS_AT + i) % digest.len()];
            match slot {
                b'L' => char::from(b'A' + b % 26),
                _ => char::from(b'0' + b % 10),
            }
        })
        .collect()
}

/// Extract a plate for `image_uri` captured under `condition`.
pub fn extract_plate(
    image_uri: &str,
    condition: ImageCondition,
    penalties: &PlatePenalties,
) -> Result<PlateResult, InputError> {
    let image_uri = validate_identifier(image_uri)?;
    let d = sha256(format!("{image_uri}{PLATE_SALT}").as_bytes());

    let template = PLATE_TEMPLATES[digest_word(&d, TEMPLATE_AT) as usize % PLATE_TEMPLATES.len()];
    let base = rescale(
        digest_word(&d, CONFIDENCE_AT),
        PLATE_CONFIDENCE_MIN,
        PLATE_CONFIDENCE_MAX,
    );
    let confidence = (base - penalties.for_condition(condition)).max(0.0);

    let plate = (confidence >= PLATE_READ_FLOOR).then(|| render_plate(template, &d));
    Ok(PlateResult { plate, confidence })
}

/// [`PlateExtractor`] backed by [`extract_plate`].
#[derive(Debug, Clone, Default)]
pub struct MockPlateExtractor {
    penalties: PlatePenalties,
}

impl MockPlateExtractor {
    pub fn new(penalties: PlatePenalties) -> anyhow::Result<Self> {
        penalties.validate()?;
        Ok(Self { penalties })
    }

    pub fn penalties(&self) -> &PlatePenalties {
        &self.penalties
    }
}

impl PlateExtractor for MockPlateExtractor {
    fn extract(
        &self,
        image_uri: &str,
        condition: ImageCondition,
    ) -> Result<PlateResult, BackendError> {
        let result = extract_plate(image_uri, condition, &self.penalties)?;
        tracing::debug!(
            image_uri,
            plate = ?result.plate,
            confidence = result.confidence,
            "mock plate extraction"
        );
        Ok(result)
    }
}
