//! Pairing an account with a runner: the connection/session reconciliation flow.
//!
//! ```text
//! none ──open──▶ choice ──choose_production──▶ production (polls the runner)
//!                   │                            │  adopt_existing ──▶ none
//!                   │                            │  force_reset ──▶ RESETTING ─4s─▶ INITIALIZING
//!                   └──choose_simulator──▶ simulator ──100%──▶ none
//! ```
//!
//! Every background task (poller, simulator ticker, reset cooldown) is owned by
//! the flow and aborted when the flow leaves the state that needs it, is
//! closed, or is dropped.

use crate::config::{
    POLL_BACKOFF_MAX, POLL_INTERVAL, RESET_COOLDOWN, SIMULATOR_CLOSE_DELAY, SIMULATOR_STEP,
    SIMULATOR_TICK,
};
use crate::error::AppError;
use crate::interfaces::RunnerApi;
use crate::registry::SharedRegistry;
use crate::types::{BotAccount, RunnerStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingStep {
    None,
    Choice,
    Production,
    Simulator,
}

impl PairingStep {
    fn name(self) -> &'static str {
        match self {
            Self::None => "closed",
            Self::Choice => "choosing a mode",
            Self::Production => "pairing with a runner",
            Self::Simulator => "simulating",
        }
    }
}

/// Ways out of a runner that already holds a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    UseExistingSession,
    ResetAndNewQr,
}

/// What the pairing UI renders. Poll results only ever land here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingSnapshot {
    pub step: PairingStep,
    pub account_id: Option<String>,
    pub runner_url: Option<String>,
    pub qr: Option<String>,
    pub status: RunnerStatus,
    pub is_resetting: bool,
    pub progress: u8,
    pub logs: Vec<String>,
    pub notice: Option<String>,
}

impl PairingSnapshot {
    fn closed() -> Self {
        Self {
            step: PairingStep::None,
            account_id: None,
            runner_url: None,
            qr: None,
            status: RunnerStatus::Connecting,
            is_resetting: false,
            progress: 0,
            logs: Vec::new(),
            notice: None,
        }
    }

    /// Choices to offer when the runner reports an existing session.
    pub fn resolutions(&self) -> Vec<Resolution> {
        if self.step == PairingStep::Production
            && !self.is_resetting
            && self.status == RunnerStatus::Connected
        {
            vec![Resolution::UseExistingSession, Resolution::ResetAndNewQr]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PairingTiming {
    pub poll_interval: Duration,
    pub poll_backoff_max: Duration,
    pub reset_cooldown: Duration,
    pub simulator_tick: Duration,
    pub simulator_step: u8,
    pub simulator_close_delay: Duration,
}

impl Default for PairingTiming {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            poll_backoff_max: POLL_BACKOFF_MAX,
            reset_cooldown: RESET_COOLDOWN,
            simulator_tick: SIMULATOR_TICK,
            simulator_step: SIMULATOR_STEP,
            simulator_close_delay: SIMULATOR_CLOSE_DELAY,
        }
    }
}

/// Delay before the next poll after `failures` consecutive errors.
pub fn poll_delay(base: Duration, max: Duration, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures.min(16)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max.max(base))
}

/// Aborts its task when dropped.
struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    fn spawn<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(fut))
    }

    fn is_running(&self) -> bool {
        !self.0.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct PairingFlow {
    runner: Arc<dyn RunnerApi>,
    registry: SharedRegistry,
    timing: PairingTiming,
    state: Arc<watch::Sender<PairingSnapshot>>,
    poller: Option<TaskGuard>,
    simulator: Option<TaskGuard>,
    cooldown: Option<TaskGuard>,
}

impl PairingFlow {
    pub fn new(runner: Arc<dyn RunnerApi>, registry: SharedRegistry) -> Self {
        let (tx, _rx) = watch::channel(PairingSnapshot::closed());
        Self {
            runner,
            registry,
            timing: PairingTiming::default(),
            state: Arc::new(tx),
            poller: None,
            simulator: None,
            cooldown: None,
        }
    }

    pub fn with_timing(mut self, timing: PairingTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn snapshot(&self) -> PairingSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PairingSnapshot> {
        self.state.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(TaskGuard::is_running)
    }

    /// Start pairing `account_id`. Any flow already in progress is dropped.
    pub async fn open(&mut self, account_id: &str, runner_url: Option<String>) -> Result<(), AppError> {
        self.registry.lock().await.require(account_id)?;
        self.stop_tasks();
        self.state.send_replace(PairingSnapshot {
            step: PairingStep::Choice,
            account_id: Some(account_id.to_string()),
            runner_url: runner_url.filter(|u| !u.trim().is_empty()),
            ..PairingSnapshot::closed()
        });
        debug!(account = account_id, "pairing opened");
        Ok(())
    }

    /// Pair through the account's runner. Without a URL nothing is polled.
    pub fn choose_production(&mut self) -> Result<(), AppError> {
        self.expect_step(PairingStep::Choice, "pair with a runner")?;
        self.state.send_modify(|s| {
            s.step = PairingStep::Production;
            s.status = RunnerStatus::Connecting;
            s.qr = None;
            s.notice = None;
        });
        self.restart_poller();
        Ok(())
    }

    /// Point the flow at another runner. Restarts polling when in production.
    pub fn set_runner_url(&mut self, url: Option<String>) {
        let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        self.state.send_modify(|s| {
            s.runner_url = url;
            s.qr = None;
        });
        if self.snapshot().step == PairingStep::Production {
            self.cooldown = None;
            self.state.send_modify(|s| {
                s.is_resetting = false;
                s.status = RunnerStatus::Connecting;
            });
            self.restart_poller();
        }
    }

    /// Leave production or simulator and go back to the mode choice.
    pub fn back(&mut self) -> Result<(), AppError> {
        let step = self.snapshot().step;
        if step == PairingStep::None {
            return Err(self.invalid("go back"));
        }
        self.stop_tasks();
        self.state.send_modify(|s| {
            s.step = PairingStep::Choice;
            s.qr = None;
            s.is_resetting = false;
            s.progress = 0;
            s.notice = None;
        });
        Ok(())
    }

    /// Adopt the session the runner already holds and close the flow.
    pub async fn adopt_existing(&mut self) -> Result<BotAccount, AppError> {
        let snap = self.snapshot();
        if !snap.resolutions().contains(&Resolution::UseExistingSession) {
            return Err(self.invalid("use the existing session"));
        }
        let account_id = snap.account_id.unwrap_or_default();
        let account = self.registry.lock().await.mark_connected(&account_id).await?;
        info!(account = %account_id, "adopted existing runner session");
        self.close();
        Ok(account)
    }

    /// Log the runner out, wait for it to restart, then resume polling.
    pub async fn force_reset(&mut self) -> Result<(), AppError> {
        let snap = self.snapshot();
        if snap.step != PairingStep::Production || snap.is_resetting {
            return Err(self.invalid("reset the runner"));
        }
        let url = snap
            .runner_url
            .ok_or_else(|| AppError::MissingRunnerUrl(snap.account_id.clone().unwrap_or_default()))?;

        self.cooldown = None;
        self.state.send_modify(|s| {
            s.is_resetting = true;
            s.status = RunnerStatus::Resetting;
            s.qr = None;
            s.notice = None;
        });

        match self.runner.logout(&url).await {
            Ok(ack) => {
                if !ack.success {
                    warn!(%url, "runner answered logout without success");
                }
                let state = self.state.clone();
                let cooldown = self.timing.reset_cooldown;
                self.cooldown = Some(TaskGuard::spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    state.send_if_modified(|s| {
                        if s.step != PairingStep::Production || !s.is_resetting {
                            return false;
                        }
                        s.is_resetting = false;
                        s.status = RunnerStatus::Initializing;
                        true
                    });
                }));
                info!(%url, "runner reset requested");
                Ok(())
            }
            Err(e) => {
                warn!(%url, error = %e, "runner reset failed");
                self.state.send_modify(|s| {
                    s.is_resetting = false;
                    s.status = RunnerStatus::Error;
                    s.notice = Some("Could not reset the runner. Check the URL.".into());
                });
                Err(e)
            }
        }
    }

    /// Fake a successful pairing locally, without any network traffic.
    pub fn choose_simulator(&mut self) -> Result<(), AppError> {
        self.expect_step(PairingStep::Choice, "start the simulator")?;
        let account_id = self.snapshot().account_id.unwrap_or_default();
        self.stop_tasks();
        self.state.send_modify(|s| {
            s.step = PairingStep::Simulator;
            s.progress = 0;
            s.notice = None;
        });

        let state = self.state.clone();
        let registry = self.registry.clone();
        let timing = self.timing;
        self.simulator = Some(TaskGuard::spawn(async move {
            loop {
                tokio::time::sleep(timing.simulator_tick).await;
                let mut done = false;
                state.send_modify(|s| {
                    s.progress = s.progress.saturating_add(timing.simulator_step).min(100);
                    done = s.progress >= 100;
                });
                if done {
                    break;
                }
            }
            if let Err(e) = registry.lock().await.mark_connected(&account_id).await {
                warn!(account = %account_id, error = %e, "simulated pairing could not update account");
            }
            tokio::time::sleep(timing.simulator_close_delay).await;
            state.send_replace(PairingSnapshot::closed());
        }));
        Ok(())
    }

    /// Cancel the flow. Safe to call in any state.
    pub fn close(&mut self) {
        self.stop_tasks();
        self.state.send_replace(PairingSnapshot::closed());
    }

    fn stop_tasks(&mut self) {
        self.poller = None;
        self.simulator = None;
        self.cooldown = None;
    }

    fn restart_poller(&mut self) {
        self.poller = None;
        let snap = self.snapshot();
        let Some(url) = snap.runner_url else {
            self.state.send_modify(|s| {
                s.notice = Some(
                    "No runner URL set for this account. Add the deployed server URL in the bot configuration first."
                        .into(),
                );
            });
            return;
        };
        debug!(%url, "runner polling started");
        self.poller = Some(TaskGuard::spawn(poll_loop(
            self.runner.clone(),
            self.state.clone(),
            url,
            self.timing,
        )));
    }

    fn expect_step(&self, step: PairingStep, action: &str) -> Result<(), AppError> {
        if self.snapshot().step == step {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &str) -> AppError {
        AppError::InvalidTransition {
            action: action.to_string(),
            state: self.snapshot().step.name().to_string(),
        }
    }
}

async fn poll_loop(
    runner: Arc<dyn RunnerApi>,
    state: Arc<watch::Sender<PairingSnapshot>>,
    url: String,
    timing: PairingTiming,
) {
    // Ticks keep their cadence while a request is in flight; only errors
    // push the next deadline out.
    let mut ticker = interval_at(Instant::now() + timing.poll_interval, timing.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;
    loop {
        ticker.tick().await;
        if state.borrow().is_resetting {
            continue;
        }
        let result = runner.fetch_status(&url).await;
        if result.is_ok() {
            failures = 0;
        } else {
            failures = failures.saturating_add(1);
            ticker.reset_after(poll_delay(timing.poll_interval, timing.poll_backoff_max, failures));
        }
        state.send_if_modified(|s| {
            // A reset started while this request was in flight.
            if s.step != PairingStep::Production || s.is_resetting {
                return false;
            }
            match &result {
                Ok(status) => {
                    s.qr = status.qr.clone().filter(|q| !q.is_empty());
                    s.status = RunnerStatus::from(status.status.clone());
                    s.logs = status.logs.clone();
                }
                Err(e) => {
                    debug!(error = %e, "runner poll failed");
                    s.status = RunnerStatus::Error;
                }
            }
            true
        });
    }
}

/// Returned by [`disconnect`]; the local change always happened.
#[derive(Debug, Clone)]
pub struct DisconnectOutcome {
    pub account: BotAccount,
    pub remote_notice: Option<String>,
}

/// Ask the runner to log out (best effort), then mark the account offline.
///
/// The registry is not held while the runner is contacted.
pub async fn disconnect(
    registry: &SharedRegistry,
    runner: &dyn RunnerApi,
    runner_url: Option<&str>,
    account_id: &str,
) -> Result<DisconnectOutcome, AppError> {
    registry.lock().await.require(account_id)?;

    let mut remote_notice = None;
    if let Some(url) = runner_url {
        if let Err(e) = runner.logout(url).await {
            warn!(account = account_id, error = %e, "remote logout failed");
            remote_notice = Some(format!(
                "Could not reach the runner for a remote logout ({e}). Disconnected locally only."
            ));
        }
    }

    let account = registry.lock().await.mark_disconnected(account_id).await?;
    info!(account = account_id, "account disconnected");
    Ok(DisconnectOutcome {
        account,
        remote_notice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_delay_backs_off_and_caps() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(30);
        assert_eq!(poll_delay(base, max, 0), base);
        assert_eq!(poll_delay(base, max, 1), Duration::from_secs(4));
        assert_eq!(poll_delay(base, max, 3), Duration::from_secs(16));
        assert_eq!(poll_delay(base, max, 4), max);
        assert_eq!(poll_delay(base, max, 500), max);
    }

    #[test]
    fn resolutions_only_for_connected_runner() {
        let mut snap = PairingSnapshot::closed();
        snap.step = PairingStep::Production;
        snap.status = RunnerStatus::ScanNeeded;
        assert!(snap.resolutions().is_empty());

        snap.status = RunnerStatus::Connected;
        assert_eq!(
            snap.resolutions(),
            vec![Resolution::UseExistingSession, Resolution::ResetAndNewQr]
        );

        snap.is_resetting = true;
        assert!(snap.resolutions().is_empty());
    }
}
