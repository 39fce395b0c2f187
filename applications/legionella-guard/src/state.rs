use std::sync::atomic::{AtomicBool, Ordering};

/// State shared between the temperature monitor and the weekly enforcer.
#[derive(Debug, Default)]
pub struct MonitoringState {
    exceeded_since_last_weekly_check: AtomicBool,
}

impl MonitoringState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample. Returns whether it counts as exceeded.
    pub fn record_reading(&self, temperature: f64, threshold: f64) -> bool {
        let exceeded = temperature > threshold;
        self.exceeded_since_last_weekly_check
            .store(exceeded, Ordering::SeqCst);
        exceeded
    }

    pub fn exceeded(&self) -> bool {
        self.exceeded_since_last_weekly_check.load(Ordering::SeqCst)
    }

    /// Read and clear in one step.
    pub fn take_exceeded(&self) -> bool {
        self.exceeded_since_last_weekly_check
            .swap(false, Ordering::SeqCst)
    }
}
