//! Temperature monitor background task
//!
//! Samples the hot-water sensor on a fixed interval and keeps the shared
//! "exceeded since last weekly check" flag up to date.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::sensor::TemperatureSource;
use crate::state::MonitoringState;

pub struct TemperatureMonitor {
    source: Arc<dyn TemperatureSource>,
    state: Arc<MonitoringState>,
    threshold: f64,
    check_interval: Duration,
}

impl TemperatureMonitor {
    pub fn new(
        source: Arc<dyn TemperatureSource>,
        state: Arc<MonitoringState>,
        threshold: f64,
        check_interval: Duration,
    ) -> Self {
        Self {
            source,
            state,
            threshold,
            check_interval,
        }
    }

    /// Run the sampling loop. Never returns; the owner aborts the task.
    pub async fn run(&self) {
        tracing::info!(
            "Temperature monitor started (interval: {}s, threshold: {:.1}°C)",
            self.check_interval.as_secs(),
            self.threshold
        );

        let mut interval = interval(self.check_interval);

        // The first tick completes immediately; sample one full interval after start
        interval.tick().await;

        loop {
            interval.tick().await;
            self.check_once().await;
        }
    }

    /// Take one sample and update the shared flag. A failed read leaves the
    /// flag untouched. Returns the reading when there was one.
    pub async fn check_once(&self) -> Option<f64> {
        let temperature = match self.source.read_temperature().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Failed to get temperature: {}", e);
                return None;
            }
        };

        if self.state.record_reading(temperature, self.threshold) {
            tracing::info!(
                "Temperature {:.1}°C has exceeded {:.1}°C, legionella heating will be skipped this week",
                temperature,
                self.threshold
            );
        } else {
            tracing::info!("Temperature is OK. Actual temperature: {:.1}°C", temperature);
        }

        Some(temperature)
    }
}
