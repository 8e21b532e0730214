//! Natal chart data from the chart computation service.
//!
//! Planet and house positions are computed elsewhere; this module only
//! defines the boundary and an HTTP client for it.

pub mod client;

pub use client::RemoteChartSource;

use crate::models::{BigThree, BirthDetails, CelestialBody, ChartPoint, CuspPosition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the point whose sign is the rising sign.
pub const RISING_POINT: &str = "First_House";

/// Errors from the chart service.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart service request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to chart service at {0}")]
    Unreachable(String),

    #[error("chart service request failed: {0}")]
    Transport(String),

    #[error("chart service error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed chart payload: {0}")]
    Malformed(String),

    #[error("chart has no '{0}' point")]
    MissingPoint(&'static str),
}

/// A computed natal chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatalChart {
    /// Planets and chart points, in the order the service returned them.
    pub points: Vec<ChartPoint>,
    /// House cusps, first house first.
    #[serde(default)]
    pub houses: Vec<CuspPosition>,
}

impl NatalChart {
    /// Name/angle pairs for aspect detection, in chart order.
    pub fn bodies(&self) -> Vec<CelestialBody> {
        self.points.iter().map(ChartPoint::as_body).collect()
    }

    pub fn point(&self, name: &str) -> Option<&ChartPoint> {
        self.points.iter().find(|p| p.name == name)
    }

    /// Sun, Moon and rising signs, untranslated.
    pub fn big_three(&self) -> Result<BigThree, ChartError> {
        let sign_of = |name: &'static str| {
            self.point(name)
                .map(|p| p.sign.clone())
                .ok_or(ChartError::MissingPoint(name))
        };

        Ok(BigThree {
            sun: sign_of("Sun")?,
            moon: sign_of("Moon")?,
            rising: sign_of(RISING_POINT)?,
        })
    }
}

/// Something that can compute a natal chart for a birth moment.
#[async_trait]
pub trait ChartSource: Send + Sync {
    async fn compute(&self, birth: &BirthDetails) -> Result<NatalChart, ChartError>;
}
