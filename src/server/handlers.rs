//! HTTP request handlers.
//!
//! Chart and aspect endpoints never touch the narrative backends, so a
//! failing language model cannot affect them.

use super::AppState;
use crate::error::ApiError;
use crate::models::{Aspect, BirthData, CelestialBody, ChartPoint, HouseCusp};
use crate::narrative::build_prompt;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub status: &'static str,
    pub planets: Vec<ChartPoint>,
    pub aspects: Vec<Aspect>,
    pub houses: Vec<HouseCusp>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub status: &'static str,
    pub analysis: String,
}

#[derive(Debug, Deserialize)]
pub struct AspectsRequest {
    pub bodies: Vec<CelestialBody>,
}

#[derive(Debug, Serialize)]
pub struct AspectsResponse {
    pub status: &'static str,
    pub aspects: Vec<Aspect>,
}

/// Liveness check.
pub async fn home() -> &'static str {
    "Astrology API is running"
}

/// Planets, aspects and houses for a birth moment.
pub async fn get_data(
    State(state): State<AppState>,
    payload: Result<Json<BirthData>, JsonRejection>,
) -> Result<Json<ChartResponse>, ApiError> {
    let Json(raw) = payload?;
    let birth = raw.resolve(&state.birth_defaults)?;
    info!(
        "Chart requested for {} ({}, {})",
        birth.name, birth.city, birth.country
    );

    let chart = state.chart.compute(&birth).await?;

    // Detection runs on canonical names; display names come after.
    let aspects = state.detector.detect(&chart.bodies());
    debug!("Found {} aspects", aspects.len());

    let localizer = &state.localizer;
    Ok(Json(ChartResponse {
        status: SUCCESS,
        planets: chart.points.iter().map(|p| localizer.planet(p)).collect(),
        aspects: aspects.iter().map(|a| localizer.aspect(a)).collect(),
        houses: localizer.houses(&chart.houses),
    }))
}

/// Personality summary of the Sun, Moon and rising signs.
pub async fn analyze_big_three(
    State(state): State<AppState>,
    payload: Result<Json<BirthData>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(raw) = payload?;
    let birth = raw.resolve(&state.birth_defaults)?;
    info!("Big-three analysis requested for {}", birth.name);

    let chart = state.chart.compute(&birth).await?;
    let signs = state.localizer.big_three(&chart.big_three()?);
    debug!(
        "Sun {} / Moon {} / Rising {}",
        signs.sun, signs.moon, signs.rising
    );

    let analysis = state.narrative.generate(&build_prompt(&signs)).await?;

    Ok(Json(AnalysisResponse {
        status: SUCCESS,
        analysis,
    }))
}

/// Aspects among caller-supplied bodies.
pub async fn aspects(
    State(state): State<AppState>,
    payload: Result<Json<AspectsRequest>, JsonRejection>,
) -> Result<Json<AspectsResponse>, ApiError> {
    let Json(request) = payload?;
    info!("Aspects requested for {} bodies", request.bodies.len());

    Ok(Json(AspectsResponse {
        status: SUCCESS,
        aspects: state.detector.detect(&request.bodies),
    }))
}
