use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::auth::TokenManager;
use crate::error::{AppError, Result};

#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Current water temperature in degrees Celsius.
    async fn read_temperature(&self) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct SensorResponse {
    data: SensorData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensorData {
    current_water_temp: f64,
}

/// Reads the hot-water sensor through the Solar Manager stream API.
pub struct SolarManagerSensor {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    url: String,
}

impl SolarManagerSensor {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>, url: impl Into<String>) -> Self {
        Self {
            http,
            tokens,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TemperatureSource for SolarManagerSensor {
    async fn read_temperature(&self) -> Result<f64> {
        let token = self.tokens.ensure_valid_token().await?;

        let resp = self.http.get(&self.url).bearer_auth(token).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Status {
                context: "temperature read",
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let parsed: SensorResponse = serde_json::from_slice(&bytes)?;
        debug!(temperature = parsed.data.current_water_temp, "sensor reading");
        Ok(parsed.data.current_water_temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_nested_temperature() {
        let parsed: SensorResponse = serde_json::from_str(
            r#"{"data":{"currentWaterTemp":61.5,"currentPower":0},"timestamp":"x"}"#,
        )
        .unwrap();
        assert_eq!(parsed.data.current_water_temp, 61.5);
    }

    #[test]
    fn test_rejects_non_numeric_temperature() {
        let parsed = serde_json::from_str::<SensorResponse>(r#"{"data":{"currentWaterTemp":"hot"}}"#);
        assert!(parsed.is_err());
    }
}
