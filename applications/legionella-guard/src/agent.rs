use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::auth::{Credentials, TokenManager};
use crate::checkpoint::CheckpointStore;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::enforcer::WeeklyEnforcer;
use crate::error::Result;
use crate::heating::SolarManagerHeatPump;
use crate::monitor::TemperatureMonitor;
use crate::sensor::SolarManagerSensor;
use crate::state::MonitoringState;

/// Both control loops, wired to one token manager and one shared state.
pub struct Agent {
    monitor: TemperatureMonitor,
    enforcer: WeeklyEnforcer,
}

impl Agent {
    pub fn new(monitor: TemperatureMonitor, enforcer: WeeklyEnforcer) -> Self {
        Self { monitor, enforcer }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            cfg.identity_url.clone(),
            Credentials {
                email: cfg.username.clone(),
                password: cfg.password.clone(),
            },
            Arc::clone(&clock),
        ));
        let sensor = SolarManagerSensor::new(http.clone(), Arc::clone(&tokens), cfg.sensor_url());
        let heat_pump = SolarManagerHeatPump::new(http, tokens, cfg.heat_pump_url());

        let state = Arc::new(MonitoringState::new());
        let monitor = TemperatureMonitor::new(
            Arc::new(sensor),
            Arc::clone(&state),
            cfg.temperature_threshold,
            cfg.check_interval(),
        );
        let enforcer = WeeklyEnforcer::new(
            Arc::new(heat_pump),
            state,
            CheckpointStore::new(&cfg.checkpoint_file),
            clock,
            cfg.weekly_interval(),
        )
        .with_heating_duration(cfg.heating_duration());

        Ok(Self::new(monitor, enforcer))
    }

    /// Run both loops until `shutdown` completes. A loop that ends early is
    /// logged and the other one keeps running.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let monitor = self.monitor;
        let mut monitor_handle = tokio::spawn(async move { monitor.run().await });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut enforcer_handle = tokio::spawn(self.enforcer.run(async move {
            let _ = stop_rx.await;
        }));
        info!("Temperature monitor and weekly enforcer running");

        tokio::pin!(shutdown);
        let mut monitor_alive = true;
        let mut enforcer_alive = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                res = &mut monitor_handle, if monitor_alive => {
                    monitor_alive = false;
                    match res {
                        Ok(()) => error!("Temperature monitor exited unexpectedly"),
                        Err(e) => error!("Temperature monitor task failed: {}", e),
                    }
                }
                res = &mut enforcer_handle, if enforcer_alive => {
                    enforcer_alive = false;
                    match res {
                        Ok(()) => error!("Weekly enforcer exited unexpectedly"),
                        Err(e) => error!("Weekly enforcer task failed: {}", e),
                    }
                }
            }
        }

        monitor_handle.abort();
        let _ = stop_tx.send(());
        if enforcer_alive {
            if let Err(e) = enforcer_handle.await {
                error!("Weekly enforcer task failed: {}", e);
            }
        }
        info!("Agent stopped");
    }
}
