use std::time::Duration;

/// Reconnect schedule for the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts after which automatic reconnection stops.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Growth factor per attempt (2.0 doubles, 1.5 grows by half).
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// What the channel should do after its connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Retry(Duration),
    /// The server announced shutdown; wait for a manual reconnect.
    Suppressed,
    /// The attempt ceiling was reached; wait for a manual reconnect.
    Exhausted,
}

/// Push-channel health, owned by the channel worker and published as snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_server_shutting_down: bool,
    pub last_error: Option<String>,
    /// Consecutive failed attempts since the last successful open.
    pub attempt_count: u32,
    pub retries_exhausted: bool,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Automatic (re)connection is allowed.
    pub fn can_auto_connect(&self) -> bool {
        !self.is_server_shutting_down && !self.retries_exhausted
    }

    pub fn on_open(&mut self) {
        self.is_connected = true;
        self.attempt_count = 0;
        self.last_error = None;
        self.retries_exhausted = false;
    }

    /// Records a close or a failed attempt and decides what happens next.
    pub fn on_close(&mut self, reason: Option<String>, policy: &ReconnectPolicy) -> CloseOutcome {
        self.is_connected = false;
        if self.is_server_shutting_down {
            return CloseOutcome::Suppressed;
        }
        self.attempt_count = self.attempt_count.saturating_add(1);
        if let Some(reason) = reason {
            self.last_error = Some(reason);
        }
        if self.attempt_count >= policy.max_attempts {
            self.retries_exhausted = true;
            self.last_error = Some(format!(
                "Gave up after {} failed connection attempts",
                self.attempt_count
            ));
            return CloseOutcome::Exhausted;
        }
        CloseOutcome::Retry(policy.delay_for(self.attempt_count))
    }

    pub fn on_shutdown(&mut self, message: &str) {
        self.is_server_shutting_down = true;
        self.is_connected = false;
        self.last_error = Some(format!("Server is shutting down: {message}"));
    }

    /// Clears suppression so a manual reconnect may proceed.
    pub fn reset_for_manual(&mut self) {
        self.is_server_shutting_down = false;
        self.retries_exhausted = false;
        self.attempt_count = 0;
        self.last_error = None;
    }
}
