//! The poll loop: read, assess, alert, sleep.

use std::future::Future;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};

use super::level::{assess, LevelReport, Thresholds};
use super::throttle::{AlertThrottle, ThrottlePolicy};
use crate::config::Config;
use crate::error::{MonitorError, NotifyError};
use crate::metrics;
use crate::notify::{format_low_alert, format_status, AlertSink, Priority};
use crate::stoker::{SessionClient, StokerApi};

/// Loop state. Both states share one timer with different waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    /// Last cycle succeeded.
    #[default]
    Running,
    /// Last cycles failed.
    Backoff {
        /// Consecutive failed cycles.
        failures: u32,
    },
}

/// Wait durations between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Wait after a successful cycle.
    pub interval: Duration,
    /// Cap on the wait after repeated failures.
    pub max_backoff: Duration,
}

impl Schedule {
    /// Schedule from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.check_interval(),
            max_backoff: config.max_backoff(),
        }
    }

    /// Wait before the next cycle.
    ///
    /// The first failure waits the normal interval; each further consecutive
    /// failure doubles it, up to `max_backoff`.
    pub fn delay(&self, state: PollState) -> Duration {
        match state {
            PollState::Running => self.interval,
            PollState::Backoff { failures } => {
                let doublings = failures.saturating_sub(1).min(16);
                self.interval
                    .saturating_mul(1 << doublings)
                    .min(self.max_backoff.max(self.interval))
            }
        }
    }
}

/// What a successful cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Level above threshold.
    Ok(LevelReport),
    /// Level low and an alert was delivered.
    AlertSent(LevelReport),
    /// Level low but an alert was sent recently.
    AlertSuppressed {
        /// The reading.
        report: LevelReport,
        /// Time until alerts are allowed again.
        remaining: time::Duration,
    },
    /// Level low and the alert could not be delivered.
    AlertFailed {
        /// The reading.
        report: LevelReport,
        /// Delivery error.
        error: NotifyError,
    },
}

impl CycleOutcome {
    /// The reading this cycle assessed.
    pub fn report(&self) -> &LevelReport {
        match self {
            Self::Ok(report) | Self::AlertSent(report) => report,
            Self::AlertSuppressed { report, .. } | Self::AlertFailed { report, .. } => report,
        }
    }
}

/// Hopper monitor: owns the session, the alert sink and the throttle.
#[derive(Debug)]
pub struct Monitor<A, S> {
    /// StokerCloud session.
    session: SessionClient<A>,
    /// Notification destination.
    sink: S,
    /// Alert suppression state.
    throttle: AlertThrottle,
    /// When the throttle window starts.
    policy: ThrottlePolicy,
    /// Alert thresholds.
    thresholds: Thresholds,
    /// Notification title.
    title: String,
    /// Notification priority.
    priority: Priority,
    /// Wait durations.
    schedule: Schedule,
    /// Current loop state.
    state: PollState,
    /// Cycles run so far.
    cycles: u64,
}

impl<A: StokerApi, S: AlertSink> Monitor<A, S> {
    /// Create a monitor from config.
    pub fn new(session: SessionClient<A>, sink: S, config: &Config) -> Self {
        Self {
            session,
            sink,
            throttle: AlertThrottle::new(config.min_alert_interval()),
            policy: config.alert_throttle_policy,
            thresholds: Thresholds::from_config(config),
            title: config.ntfy_title.clone(),
            priority: config.ntfy_priority,
            schedule: Schedule::from_config(config),
            state: PollState::Running,
            cycles: 0,
        }
    }

    /// Current loop state.
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Alert throttle.
    pub fn throttle(&self) -> &AlertThrottle {
        &self.throttle
    }

    /// Session client.
    pub fn session(&self) -> &SessionClient<A> {
        &self.session
    }

    /// Wait before the next cycle.
    pub fn next_delay(&self) -> Duration {
        self.schedule.delay(self.state)
    }

    /// Run one cycle without catching its error.
    #[instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub async fn run_cycle(&mut self, now: OffsetDateTime) -> Result<CycleOutcome, MonitorError> {
        self.cycles += 1;

        let reading = self.session.get_reading().await?;
        let report = assess(reading.kg, &self.thresholds);
        metrics::set_hopper_level(report.kg, report.percent);

        if !report.is_low {
            info!("{}", format_status(report.kg, report.percent, self.thresholds.low_kg));
            return Ok(CycleOutcome::Ok(report));
        }

        warn!(
            kg = report.kg,
            threshold_kg = self.thresholds.low_kg,
            "Hopper level at or below threshold"
        );

        if !self.throttle.should_alert(now) {
            let remaining = self.throttle.remaining(now);
            metrics::inc_alerts_suppressed();
            info!(
                remaining_seconds = remaining.whole_seconds(),
                "Hopper low but last alert was recent; skipping alert"
            );
            return Ok(CycleOutcome::AlertSuppressed { report, remaining });
        }

        let message = format_low_alert(report.kg, report.percent, self.thresholds.low_kg);
        let result = self.sink.send(&message, self.priority, &self.title).await;

        if self.policy.records(result.is_ok()) {
            self.throttle.record_alert(now);
        }

        match result {
            Ok(()) => {
                metrics::inc_alerts_sent();
                Ok(CycleOutcome::AlertSent(report))
            }
            Err(error) => {
                metrics::inc_alerts_failed();
                error!(step = "notify", error = %error, "Failed to send alert");
                Ok(CycleOutcome::AlertFailed { report, error })
            }
        }
    }

    /// Run one cycle, log any failure and update the loop state.
    pub async fn tick(&mut self, now: OffsetDateTime) -> Result<CycleOutcome, MonitorError> {
        metrics::inc_cycles();
        let result = self.run_cycle(now).await;

        match &result {
            Ok(_) => {
                if let PollState::Backoff { failures } = self.state {
                    info!(failures, "Recovered after failed cycles");
                }
                self.state = PollState::Running;
            }
            Err(e) => {
                let failures = match self.state {
                    PollState::Running => 1,
                    PollState::Backoff { failures } => failures.saturating_add(1),
                };
                self.state = PollState::Backoff { failures };
                metrics::inc_cycle_failures(e.step());
                error!(step = e.step(), failures, error = %e, "Final failure this cycle");
            }
        }

        result
    }

    /// Poll until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let _ = self.tick(OffsetDateTime::now_utc()).await;

            let delay = self.next_delay();
            debug!(delay_secs = delay.as_secs(), state = ?self.state, "Sleeping until next cycle");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
            }
        }
    }
}
