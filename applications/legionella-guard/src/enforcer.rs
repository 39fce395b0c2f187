//! Weekly legionella enforcement task
//!
//! Waits until the checkpoint says a week has passed, then forces a heating
//! cycle unless the monitor saw the water above the threshold since the last
//! check. The delay is re-derived from the checkpoint after every cycle so
//! the schedule survives restarts.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::clock::Clock;
use crate::heating::{ChargingMode, HeatingControl};
use crate::state::MonitoringState;

/// Heating cycle length used when none is configured.
pub const DEFAULT_HEATING_DURATION: Duration = Duration::from_secs(4 * 3600);

/// Delay until the next weekly check given the last completed one. A
/// checkpoint whose due time is not representable counts as unusable, so
/// the check is due now.
pub fn compute_next_delay(
    now: DateTime<Utc>,
    last_check: Option<DateTime<Utc>>,
    weekly_interval: chrono::Duration,
) -> Duration {
    let Some(due) = last_check.and_then(|last| last.checked_add_signed(weekly_interval)) else {
        return Duration::ZERO;
    };
    if now >= due {
        return Duration::ZERO;
    }
    (due - now).to_std().unwrap_or(Duration::ZERO)
}

/// What a weekly cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The water already got hot enough this week.
    Skipped,
    /// A heating cycle was forced; `heating_on` tells whether the on command succeeded.
    Forced { heating_on: bool },
}

pub struct WeeklyEnforcer {
    heating: Arc<dyn HeatingControl>,
    state: Arc<MonitoringState>,
    store: CheckpointStore,
    clock: Arc<dyn Clock>,
    weekly_interval: chrono::Duration,
    heating_duration: Duration,
    last_fired: Option<DateTime<Utc>>,
    pending_off: Option<JoinHandle<()>>,
}

impl WeeklyEnforcer {
    pub fn new(
        heating: Arc<dyn HeatingControl>,
        state: Arc<MonitoringState>,
        store: CheckpointStore,
        clock: Arc<dyn Clock>,
        weekly_interval: chrono::Duration,
    ) -> Self {
        Self {
            heating,
            state,
            store,
            clock,
            weekly_interval,
            heating_duration: DEFAULT_HEATING_DURATION,
            last_fired: None,
            pending_off: None,
        }
    }

    pub fn with_heating_duration(mut self, heating_duration: Duration) -> Self {
        self.heating_duration = heating_duration;
        self
    }

    /// Run until `shutdown` completes. A pending shut-off is turned into an
    /// immediate one on the way out.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Weekly enforcer started (interval: {}h, heating duration: {}min)",
            self.weekly_interval.num_hours(),
            self.heating_duration.as_secs() / 60
        );

        self.resume().await;

        loop {
            let delay = self.next_delay().await;
            info!("Next legionella check in {}", format_delay(delay));

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {
                    self.fire().await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Delay until the next cycle, from the checkpoint on disk.
    pub async fn next_delay(&self) -> Duration {
        let last_check = match self.store.load().await {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("No usable checkpoint: {}", e);
                // A checkpoint that could not be written must not make the
                // loop fire back to back.
                self.last_fired
            }
        };
        compute_next_delay(self.clock.now(), last_check, self.weekly_interval)
    }

    /// Evaluate the week once.
    pub async fn fire(&mut self) -> CycleOutcome {
        let now = self.clock.now();
        let exceeded = self.state.take_exceeded();

        let outcome = if exceeded {
            info!("Temperature exceeded the threshold this week, no legionella heating needed");
            CycleOutcome::Skipped
        } else {
            info!("Temperature never exceeded the threshold this week, forcing a heating cycle");
            let heating_on = match self.heating.set_charging_mode(ChargingMode::On).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to turn on heating: {}", e);
                    false
                }
            };
            self.schedule_shut_off(self.heating_duration);
            CycleOutcome::Forced { heating_on }
        };

        self.last_fired = Some(now);
        if let Err(e) = self.store.save(now).await {
            error!(
                "Failed to save last check time to {}: {}",
                self.store.path().display(),
                e
            );
        }

        outcome
    }

    /// Re-arm the shut-off of a cycle that was interrupted by a restart.
    ///
    /// The checkpoint holds only the time of the last cycle, not whether it
    /// forced heating. A restart inside the heating window after a skipped
    /// cycle therefore also sends one `Off`, which leaves an idle heat pump
    /// idle.
    pub async fn resume(&mut self) {
        let Ok(last_check) = self.store.load().await else {
            return;
        };
        let Some(deadline) = chrono::Duration::from_std(self.heating_duration)
            .ok()
            .and_then(|window| last_check.checked_add_signed(window))
        else {
            return;
        };
        let now = self.clock.now();
        if now >= deadline {
            return;
        }
        let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
        info!(
            "Last check at {} is still inside the heating window, shut-off in {}",
            last_check,
            format_delay(remaining)
        );
        self.schedule_shut_off(remaining);
    }

    pub fn shut_off_pending(&self) -> bool {
        self.pending_off
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel a pending shut-off timer and switch the heat pump off now.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.pending_off.take() else {
            return;
        };
        if handle.is_finished() {
            return;
        }
        handle.abort();
        info!("Shutting down with a heating cycle in progress, turning heating off now");
        if let Err(e) = self.heating.set_charging_mode(ChargingMode::Off).await {
            error!("Failed to turn off heating: {}", e);
        }
    }

    fn schedule_shut_off(&mut self, after: Duration) {
        if let Some(previous) = self.pending_off.take() {
            if !previous.is_finished() {
                warn!("Replacing a shut-off that has not fired yet");
                previous.abort();
            }
        }

        let heating = Arc::clone(&self.heating);
        self.pending_off = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            match heating.set_charging_mode(ChargingMode::Off).await {
                Ok(()) => info!("Legionella heating cycle finished, heating turned off"),
                Err(e) => error!("Failed to turn off heating: {}", e),
            }
        }));
    }
}

fn format_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
