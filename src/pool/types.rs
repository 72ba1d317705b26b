use std::time::Duration;

/// Timing knobs for pooled sessions and the background sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Idle sessions older than this are evicted by a sweep.
    pub idle_timeout: Duration,
    /// Delay before the sweeper's first pass.
    pub sweep_initial_delay: Duration,
    /// Delay between later sweeper passes.
    pub sweep_interval: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(600),
            sweep_initial_delay: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl PoolSettings {
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub fn with_sweep_schedule(mut self, initial_delay: Duration, interval: Duration) -> Self {
        self.sweep_initial_delay = initial_delay;
        self.sweep_interval = interval;
        self
    }
}

/// What a sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub probed: usize,
    pub reconnected: usize,
    pub dropped: usize,
}

impl SweepReport {
    pub(crate) fn merge(&mut self, other: SweepReport) {
        self.evicted += other.evicted;
        self.probed += other.probed;
        self.reconnected += other.reconnected;
        self.dropped += other.dropped;
    }
}
