//! Display-name localization.
//!
//! Canonical names drive aspect detection; the names here are only for
//! output and must be applied after detection has run.

use crate::config::LocalizationConfig;
use crate::models::{Aspect, BigThree, ChartPoint, CuspPosition, HouseCusp};
use std::collections::BTreeMap;

/// Maps canonical body, sign and house identifiers to display names.
#[derive(Debug, Clone, Default)]
pub struct Localizer {
    display_names: BTreeMap<String, String>,
    sign_names: BTreeMap<String, String>,
    house_names: Vec<String>,
}

impl Localizer {
    pub fn from_config(config: &LocalizationConfig) -> Self {
        Self {
            display_names: config.display_names.clone(),
            sign_names: config.sign_names.clone(),
            house_names: config.house_names.clone(),
        }
    }

    /// Display name for a body, or the canonical name when unmapped.
    pub fn display_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.display_names
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    /// Localized sign name, or the input when unmapped.
    pub fn sign_name<'a>(&'a self, sign: &'a str) -> &'a str {
        self.sign_names
            .get(sign)
            .map(String::as_str)
            .unwrap_or(sign)
    }

    /// Label for a 1-based house number.
    pub fn house_name(&self, id: usize) -> String {
        id.checked_sub(1)
            .and_then(|index| self.house_names.get(index))
            .cloned()
            .unwrap_or_else(|| format!("House {}", id))
    }

    pub fn planet(&self, point: &ChartPoint) -> ChartPoint {
        ChartPoint {
            name: self.display_name(&point.name).to_string(),
            ..point.clone()
        }
    }

    pub fn aspect(&self, aspect: &Aspect) -> Aspect {
        Aspect {
            body_a: self.display_name(&aspect.body_a).to_string(),
            body_b: self.display_name(&aspect.body_b).to_string(),
            ..aspect.clone()
        }
    }

    pub fn houses(&self, cusps: &[CuspPosition]) -> Vec<HouseCusp> {
        cusps
            .iter()
            .enumerate()
            .map(|(i, cusp)| HouseCusp {
                id: i + 1,
                angle: cusp.angle,
                local_name: self.house_name(i + 1),
            })
            .collect()
    }

    pub fn big_three(&self, signs: &BigThree) -> BigThree {
        BigThree {
            sun: self.sign_name(&signs.sun).to_string(),
            moon: self.sign_name(&signs.moon).to_string(),
            rising: self.sign_name(&signs.rising).to_string(),
        }
    }
}
