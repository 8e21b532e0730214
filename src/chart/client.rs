//! HTTP client for the chart computation service.

use super::{ChartError, ChartSource, NatalChart};
use crate::config::ChartConfig;
use crate::models::BirthDetails;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches charts from a remote service via `POST <service_url>/chart`.
pub struct RemoteChartSource {
    http_client: reqwest::Client,
    service_url: String,
    timeout_seconds: u64,
}

impl RemoteChartSource {
    pub fn new(config: &ChartConfig) -> Result<Self, ChartError> {
        info!("Using chart service at {}", config.service_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ChartError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chart", self.service_url)
    }
}

#[async_trait]
impl ChartSource for RemoteChartSource {
    async fn compute(&self, birth: &BirthDetails) -> Result<NatalChart, ChartError> {
        let url = self.endpoint();
        debug!(
            "Requesting chart for {} ({}, {})",
            birth.name, birth.city, birth.country
        );

        let response = self
            .http_client
            .post(&url)
            .json(birth)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChartError::Timeout(self.timeout_seconds)
                } else if e.is_connect() {
                    ChartError::Unreachable(self.service_url.clone())
                } else {
                    ChartError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChartError::Upstream { status, body });
        }

        let chart: NatalChart = response
            .json()
            .await
            .map_err(|e| ChartError::Malformed(e.to_string()))?;

        debug!(
            "Chart service returned {} points and {} houses",
            chart.points.len(),
            chart.houses.len()
        );

        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = ChartConfig {
            service_url: "http://charts:9000/".to_string(),
            ..ChartConfig::default()
        };
        let source = RemoteChartSource::new(&config).unwrap();
        assert_eq!(source.endpoint(), "http://charts:9000/chart");
    }

    #[test]
    fn test_parse_service_payload() {
        let payload = r#"{
            "points": [
                {"name": "Sun", "sign": "Leo", "abs_pos": 130.2, "house": 11},
                {"name": "First_House", "sign": "Libra", "abs_pos": 190.0}
            ],
            "houses": [{"sign": "Libra", "abs_pos": 190.0}]
        }"#;

        let chart: NatalChart = serde_json::from_str(payload).unwrap();
        assert_eq!(chart.points.len(), 2);
        assert_eq!(chart.points[0].house, Some(11));
        assert_eq!(chart.points[1].house, None);
        assert_eq!(chart.houses[0].angle, 190.0);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let config = ChartConfig {
            service_url: "http://127.0.0.1:1".to_string(),
            timeout_seconds: 2,
            ..ChartConfig::default()
        };
        let source = RemoteChartSource::new(&config).unwrap();
        let birth = BirthDetails {
            name: "Guest".to_string(),
            year: 1990,
            month: 1,
            day: 1,
            hour: 12,
            minute: 0,
            city: "Hong Kong".to_string(),
            country: "HK".to_string(),
        };

        assert!(source.compute(&birth).await.is_err());
    }
}
