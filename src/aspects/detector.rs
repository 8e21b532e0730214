//! Pairwise aspect detection between celestial bodies.
//!
//! Bodies whose canonical name contains one of the configured ignore
//! keywords (houses, axes, nodes, ...) never take part. Every remaining
//! unordered pair is reduced to its short-arc separation and tested against
//! the target angles in [`AspectKind::PRIORITY`] order.

use crate::config::AspectConfig;
use crate::models::{Aspect, AspectKind, CelestialBody};
use tracing::debug;

/// Default tolerance, in degrees, around each exact aspect angle.
pub const DEFAULT_ORB: f64 = 8.0;

/// Default name fragments of structural chart points.
pub const DEFAULT_IGNORE_KEYWORDS: [&str; 7] = [
    "First",
    "Tenth",
    "Ascendant",
    "Midheaven",
    "House",
    "Node",
    "Chiron",
];

/// Orbs above this value let neighbouring tolerance windows overlap.
pub const OVERLAP_THRESHOLD: f64 = 15.0;

/// Detects aspects between bodies within a fixed orb.
#[derive(Debug, Clone)]
pub struct AspectDetector {
    orb: f64,
    ignore_keywords: Vec<String>,
}

impl Default for AspectDetector {
    fn default() -> Self {
        Self::new(
            DEFAULT_ORB,
            DEFAULT_IGNORE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        )
    }
}

impl AspectDetector {
    pub fn new(orb: f64, ignore_keywords: Vec<String>) -> Self {
        Self {
            orb,
            ignore_keywords,
        }
    }

    pub fn from_config(config: &AspectConfig) -> Self {
        Self::new(config.orb, config.ignore_keywords.clone())
    }

    pub fn orb(&self) -> f64 {
        self.orb
    }

    /// Whether a body is a structural point rather than an aspecting body.
    ///
    /// Case-sensitive substring match against the canonical name, so this
    /// must run before any display-name localization.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.ignore_keywords
            .iter()
            .any(|keyword| name.contains(keyword.as_str()))
    }

    /// Classify the separation between two longitudes.
    ///
    /// Returns the first aspect kind, in priority order, whose exact angle
    /// lies strictly within the orb, together with the rounded deviation.
    pub fn classify(&self, angle_a: f64, angle_b: f64) -> Option<(AspectKind, f64)> {
        let separation = short_arc(angle_a, angle_b);

        AspectKind::PRIORITY.iter().find_map(|kind| {
            let deviation = (separation - kind.exact_angle()).abs();
            (deviation < self.orb).then(|| (*kind, round2(deviation)))
        })
    }

    /// Find every aspect among `bodies`, in i < j pair order.
    pub fn detect(&self, bodies: &[CelestialBody]) -> Vec<Aspect> {
        let candidates: Vec<&CelestialBody> = bodies
            .iter()
            .filter(|body| !self.is_excluded(&body.name))
            .collect();

        debug!(
            "Detecting aspects among {} of {} bodies (orb {})",
            candidates.len(),
            bodies.len(),
            self.orb
        );

        let mut aspects = Vec::new();
        for (i, first) in candidates.iter().enumerate() {
            for second in &candidates[i + 1..] {
                if let Some((kind, orb)) = self.classify(first.angle, second.angle) {
                    debug!("{} {} {} (orb {})", first.name, kind, second.name, orb);
                    aspects.push(Aspect {
                        body_a: first.name.clone(),
                        body_b: second.name.clone(),
                        kind,
                        orb,
                    });
                }
            }
        }

        aspects
    }
}

/// Angular separation reduced to the short arc.
///
/// Works on the raw difference only; longitudes are expected in [0, 360).
pub fn short_arc(angle_a: f64, angle_b: f64) -> f64 {
    let diff = (angle_a - angle_b).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Round to two decimals, ties to even (0.125 -> 0.12, 0.375 -> 0.38).
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
