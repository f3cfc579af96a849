use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use wabot_core::interfaces::RunnerApi;
use wabot_core::memory::MemoryStore;
use wabot_core::pairing::{self, PairingFlow, PairingStep, Resolution};
use wabot_core::registry::{AccountRegistry, SharedRegistry};
use wabot_core::types::{
    ConnectionStatus, QrStatus, Role, RunnerAck, RunnerStatus, ServerStatus, SessionUser,
    UpdateConfigRequest,
};
use wabot_core::AppError;

const RUNNER: &str = "https://pizzeria-bot.onrender.com";

/// Runner double answering every poll with whatever status is currently set.
struct ScriptedRunner {
    status: Mutex<QrStatus>,
    polls: AtomicUsize,
    logouts: AtomicUsize,
    unreachable: AtomicBool,
    latency: Mutex<Duration>,
}

impl ScriptedRunner {
    fn new(status: &str, qr: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(QrStatus {
                qr: qr.map(str::to_string),
                status: status.to_string(),
                logs: vec!["[10:00:00] engine started".into()],
                is_active: true,
                instance_id: None,
            }),
            polls: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
        })
    }

    fn set(&self, status: &str, qr: Option<&str>) {
        let mut s = self.status.lock().unwrap();
        s.status = status.to_string();
        s.qr = qr.map(str::to_string);
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunnerApi for ScriptedRunner {
    async fn fetch_status(&self, base_url: &str) -> Result<QrStatus, AppError> {
        assert_eq!(base_url, RUNNER);
        self.polls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Runner("connection refused".into()));
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn push_config(&self, _: &str, _: &UpdateConfigRequest) -> Result<RunnerAck, AppError> {
        Ok(RunnerAck {
            success: true,
            message: None,
        })
    }

    async fn logout(&self, _: &str) -> Result<RunnerAck, AppError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Runner("connection refused".into()));
        }
        Ok(RunnerAck {
            success: true,
            message: None,
        })
    }
}

async fn registry_with_account() -> (SharedRegistry, String) {
    let mut reg = AccountRegistry::new(Arc::new(MemoryStore::default()), "token");
    let user = SessionUser {
        id: "admin_master_id".into(),
        username: "Admin".into(),
        role: Role::Admin,
    };
    let acc = reg.create(&user, "Pizzeria", "+39 333 0000000").await.unwrap();
    (reg.into_shared(), acc.id)
}

#[tokio::test(start_paused = true)]
async fn polls_once_per_tick_and_stops_on_close() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", Some("data:image/png;base64,AAAA"));
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);

    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    assert_eq!(flow.snapshot().step, PairingStep::Choice);
    flow.choose_production().unwrap();
    assert!(flow.is_polling());
    assert_eq!(flow.snapshot().status, RunnerStatus::Connecting);

    sleep(Duration::from_millis(6_100)).await;
    assert_eq!(runner.polls(), 3);
    let snap = flow.snapshot();
    assert_eq!(snap.status, RunnerStatus::ScanNeeded);
    assert_eq!(snap.qr.as_deref(), Some("data:image/png;base64,AAAA"));
    assert_eq!(snap.logs.len(), 1);

    flow.close();
    assert!(!flow.is_polling());
    sleep(Duration::from_secs(20)).await;
    assert_eq!(runner.polls(), 3);
    assert_eq!(flow.snapshot().step, PairingStep::None);
}

#[tokio::test(start_paused = true)]
async fn slow_runner_keeps_the_two_second_cadence() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    *runner.latency.lock().unwrap() = Duration::from_millis(1_500);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();

    // Requests start at 2, 4, .., 14s even though each takes 1.5s.
    sleep(Duration::from_millis(14_100)).await;
    assert_eq!(runner.polls(), 7);
    assert_eq!(flow.snapshot().status, RunnerStatus::ScanNeeded);
    flow.close();
}

#[tokio::test(start_paused = true)]
async fn dropping_the_flow_stops_polling() {
    let runner = ScriptedRunner::new("INITIALIZING", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();

    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(runner.polls(), 1);
    drop(flow);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(runner.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_runner_url_shows_notice_without_polling() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);

    flow.open(&id, None).await.unwrap();
    flow.choose_production().unwrap();
    let snap = flow.snapshot();
    assert_eq!(snap.step, PairingStep::Production);
    assert!(snap.notice.unwrap().contains("No runner URL"));
    assert!(!flow.is_polling());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(runner.polls(), 0);

    // Supplying a URL starts exactly one poller.
    flow.set_runner_url(Some(RUNNER.into()));
    assert!(flow.is_polling());
    sleep(Duration::from_millis(4_100)).await;
    assert_eq!(runner.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn existing_session_is_offered_not_adopted() {
    let runner = ScriptedRunner::new("CONNECTED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry.clone());
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();

    sleep(Duration::from_millis(4_100)).await;
    let snap = flow.snapshot();
    assert_eq!(
        snap.resolutions(),
        vec![Resolution::UseExistingSession, Resolution::ResetAndNewQr]
    );
    assert_eq!(snap.step, PairingStep::Production);
    assert_eq!(
        registry.lock().await.get(&id).unwrap().status,
        ConnectionStatus::Disconnected
    );

    let account = flow.adopt_existing().await.unwrap();
    assert_eq!(account.status, ConnectionStatus::Connected);
    assert_eq!(account.server_status, ServerStatus::Online);
    assert!(account.last_active.is_some());
    assert_eq!(flow.snapshot().step, PairingStep::None);
    assert!(!flow.is_polling());
}

#[tokio::test(start_paused = true)]
async fn adopt_requires_a_connected_runner() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner, registry);
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();
    sleep(Duration::from_millis(2_100)).await;

    assert!(matches!(
        flow.adopt_existing().await,
        Err(AppError::InvalidTransition { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn reset_pauses_polling_for_the_cooldown() {
    let runner = ScriptedRunner::new("CONNECTED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();

    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(runner.polls(), 1);

    runner.set("SCAN_NEEDED", Some("data:image/png;base64,NEW"));
    flow.force_reset().await.unwrap();
    assert_eq!(runner.logouts.load(Ordering::SeqCst), 1);
    let snap = flow.snapshot();
    assert!(snap.is_resetting);
    assert_eq!(snap.status, RunnerStatus::Resetting);
    assert!(snap.resolutions().is_empty());

    // t = 6.4s: ticks at 4s and 6s were skipped.
    sleep(Duration::from_millis(3_900)).await;
    assert_eq!(runner.polls(), 1);
    assert_eq!(flow.snapshot().status, RunnerStatus::Resetting);

    // t = 6.6s: cooldown over, back to INITIALIZING.
    sleep(Duration::from_millis(200)).await;
    let snap = flow.snapshot();
    assert!(!snap.is_resetting);
    assert_eq!(snap.status, RunnerStatus::Initializing);

    // t = 8.1s: polling picked up the fresh QR.
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(runner.polls(), 2);
    let snap = flow.snapshot();
    assert_eq!(snap.status, RunnerStatus::ScanNeeded);
    assert_eq!(snap.qr.as_deref(), Some("data:image/png;base64,NEW"));
}

#[tokio::test(start_paused = true)]
async fn failed_reset_reports_and_clears_the_flag() {
    let runner = ScriptedRunner::new("CONNECTED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();

    runner.unreachable.store(true, Ordering::SeqCst);
    assert!(flow.force_reset().await.is_err());
    let snap = flow.snapshot();
    assert!(!snap.is_resetting);
    assert!(snap.notice.is_some());
}

#[tokio::test(start_paused = true)]
async fn unreachable_runner_sets_error_and_backs_off() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    runner.unreachable.store(true, Ordering::SeqCst);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry);
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_production().unwrap();

    // Polls at 2s, 6s (2s + 4s) and 14s (6s + 8s).
    sleep(Duration::from_millis(14_500)).await;
    assert_eq!(runner.polls(), 3);
    assert_eq!(flow.snapshot().status, RunnerStatus::Error);
    assert!(flow.is_polling());

    // Next attempt at 30s succeeds, then the 2s cadence is back.
    runner.unreachable.store(false, Ordering::SeqCst);
    sleep(Duration::from_millis(18_000)).await;
    assert_eq!(runner.polls(), 5);
    assert_eq!(flow.snapshot().status, RunnerStatus::ScanNeeded);
}

#[tokio::test(start_paused = true)]
async fn simulator_pairs_without_network() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner.clone(), registry.clone());
    let mut updates = flow.subscribe();
    flow.open(&id, Some(RUNNER.into())).await.unwrap();
    flow.choose_simulator().unwrap();

    sleep(Duration::from_millis(1_050)).await;
    assert_eq!(flow.snapshot().progress, 25);

    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(flow.snapshot().progress, 100);
    assert_eq!(
        registry.lock().await.get(&id).unwrap().status,
        ConnectionStatus::Connected
    );

    sleep(Duration::from_secs(1)).await;
    assert_eq!(flow.snapshot().step, PairingStep::None);
    assert!(updates.has_changed().unwrap());
    assert_eq!(runner.polls(), 0);
    assert_eq!(runner.logouts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn closing_the_simulator_early_leaves_the_account_alone() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    let (registry, id) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner, registry.clone());
    flow.open(&id, None).await.unwrap();
    flow.choose_simulator().unwrap();

    sleep(Duration::from_secs(1)).await;
    flow.close();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(
        registry.lock().await.get(&id).unwrap().status,
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn disconnect_is_local_even_if_the_runner_is_down() {
    let runner = ScriptedRunner::new("CONNECTED", None);
    runner.unreachable.store(true, Ordering::SeqCst);
    let (registry, id) = registry_with_account().await;
    registry.lock().await.mark_connected(&id).await.unwrap();

    let outcome = pairing::disconnect(&registry, runner.as_ref(), Some(RUNNER), &id)
        .await
        .unwrap();
    assert!(outcome.remote_notice.is_some());
    assert_eq!(outcome.account.status, ConnectionStatus::Disconnected);
    assert_eq!(outcome.account.server_status, ServerStatus::Offline);
    assert!(!outcome.account.is_active);
    assert_eq!(runner.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn open_rejects_unknown_accounts() {
    let runner = ScriptedRunner::new("SCAN_NEEDED", None);
    let (registry, _) = registry_with_account().await;
    let mut flow = PairingFlow::new(runner, registry);
    assert!(matches!(
        flow.open("nope", None).await,
        Err(AppError::UnknownAccount(_))
    ));
}
