use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wabot_core::config::MAX_ACCOUNTS;
use wabot_core::interfaces::AccountStore;
use wabot_core::memory::{MemoryPrefs, MemoryStore};
use wabot_core::registry::{AccountRegistry, PendingWrite};
use wabot_core::types::{BotAccount, Role, SessionUser};
use wabot_core::{ids, AppError};

/// MemoryStore that can be told to fail reads or writes.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_load: AtomicBool,
    fail_write: AtomicBool,
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn load_accounts(&self, user_token: &str) -> Result<Vec<BotAccount>, AppError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(AppError::Store("connection reset".into()));
        }
        self.inner.load_accounts(user_token).await
    }

    async fn save_account(&self, user_token: &str, account: &BotAccount) -> Result<(), AppError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(AppError::Store("503 Service Unavailable".into()));
        }
        self.inner.save_account(user_token, account).await
    }

    async fn delete_account(&self, id: &str) -> Result<(), AppError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(AppError::Store("503 Service Unavailable".into()));
        }
        self.inner.delete_account(id).await
    }
}

fn admin() -> SessionUser {
    SessionUser {
        id: "admin_master_id".into(),
        username: "Admin".into(),
        role: Role::Admin,
    }
}

#[tokio::test]
async fn create_stops_at_the_account_cap() {
    let store = Arc::new(FlakyStore::default());
    let mut reg = AccountRegistry::new(store.clone(), "token");

    let mut ids_seen = HashSet::new();
    for i in 0..MAX_ACCOUNTS {
        let acc = reg.create(&admin(), &format!("Shop {i}"), "+1 555 0100").await.unwrap();
        assert!(ids::is_instance_id(&acc.instance_id));
        assert!(ids_seen.insert(acc.id));
    }
    assert!(!reg.can_create());

    let err = reg.create(&admin(), "One too many", "+1").await.unwrap_err();
    assert!(matches!(err, AppError::AccountLimit(MAX_ACCOUNTS)));
    assert_eq!(reg.len(), MAX_ACCOUNTS);
    assert_eq!(store.inner.len(), MAX_ACCOUNTS);
}

#[tokio::test]
async fn delete_is_immediate_even_when_the_store_fails() {
    let store = Arc::new(FlakyStore::default());
    let mut reg = AccountRegistry::new(store.clone(), "token");
    let keep = reg.create(&admin(), "Keep", "1").await.unwrap();
    let doomed = reg.create(&admin(), "Doomed", "2").await.unwrap();
    assert_eq!(reg.selected().unwrap().id, doomed.id);

    store.fail_write.store(true, Ordering::SeqCst);
    reg.delete(&doomed.id).await.unwrap();

    assert!(reg.get(&doomed.id).is_none());
    assert!(reg.selected().is_none());
    assert_eq!(reg.accounts().len(), 1);
    assert_eq!(reg.accounts()[0].id, keep.id);
    assert_eq!(reg.pending_writes(), &[PendingWrite::Delete(doomed.id.clone())]);
    assert!(reg.sync_error().is_some());

    // Still in the store until the outbox is flushed.
    assert!(store.inner.get(&doomed.id).is_some());
    store.fail_write.store(false, Ordering::SeqCst);
    assert_eq!(reg.flush_pending().await, 1);
    assert!(store.inner.get(&doomed.id).is_none());
    assert!(reg.pending_writes().is_empty());
    assert!(reg.sync_error().is_none());
}

#[tokio::test]
async fn failed_load_keeps_the_last_good_list() {
    let store = Arc::new(FlakyStore::default());
    let mut seed = AccountRegistry::new(store.clone(), "token");
    seed.create(&admin(), "Pizzeria", "+39 333 0000000").await.unwrap();
    seed.create(&admin(), "Bakery", "+39 333 0000001").await.unwrap();

    let mut reg = AccountRegistry::new(store.clone(), "token");
    assert_eq!(reg.load().await.unwrap(), 2);
    let before: Vec<BotAccount> = reg.accounts().to_vec();

    store.fail_load.store(true, Ordering::SeqCst);
    assert!(reg.load().await.is_err());
    assert_eq!(reg.accounts(), before.as_slice());
    assert!(reg.sync_error().unwrap().contains("connection reset"));

    // Retry from the banner.
    store.fail_load.store(false, Ordering::SeqCst);
    assert_eq!(reg.load().await.unwrap(), 2);
    assert!(reg.sync_error().is_none());
}

#[tokio::test]
async fn loads_are_scoped_by_token() {
    let store = Arc::new(MemoryStore::default());
    let mut ours = AccountRegistry::new(store.clone(), "token-a");
    let mut theirs = AccountRegistry::new(store.clone(), "token-b");
    ours.create(&admin(), "Ours", "1").await.unwrap();
    theirs.create(&admin(), "Theirs", "2").await.unwrap();

    let mut fresh = AccountRegistry::new(store, "token-a");
    fresh.load().await.unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh.accounts()[0].name, "Ours");
}

#[tokio::test]
async fn unsaved_edits_survive_a_reload() {
    let store = Arc::new(FlakyStore::default());
    let mut reg = AccountRegistry::new(store.clone(), "token");
    let acc = reg.create(&admin(), "Pizzeria", "1").await.unwrap();

    store.fail_write.store(true, Ordering::SeqCst);
    let mut renamed = acc.clone();
    renamed.name = "Pizzeria Napoli".into();
    reg.update(renamed).await.unwrap();

    reg.load().await.unwrap();
    assert_eq!(reg.get(&acc.id).unwrap().name, "Pizzeria Napoli");
    assert_eq!(reg.pending_writes().len(), 1);

    // Writes still failing: the outbox keeps its entry.
    assert_eq!(reg.flush_pending().await, 0);
    assert_eq!(reg.pending_writes().len(), 1);
}

#[tokio::test]
async fn update_rejects_unknown_accounts() {
    let mut reg = AccountRegistry::new(Arc::new(MemoryStore::default()), "token");
    let acc = reg.create(&admin(), "Pizzeria", "1").await.unwrap();
    let mut ghost = acc;
    ghost.id = "does-not-exist".into();
    assert!(matches!(
        reg.update(ghost).await,
        Err(AppError::UnknownAccount(_))
    ));
}

#[tokio::test]
async fn queued_writes_survive_into_the_next_registry() {
    let store = Arc::new(FlakyStore::default());
    let prefs = Arc::new(MemoryPrefs::default());

    store.fail_write.store(true, Ordering::SeqCst);
    let created = {
        let mut first = AccountRegistry::new(store.clone(), "token").with_outbox(prefs.clone());
        let acc = first.create(&admin(), "Pizzeria", "+39 333 0000000").await.unwrap();
        assert_eq!(first.pending_writes().len(), 1);
        acc
    };
    assert!(store.inner.is_empty());

    store.fail_write.store(false, Ordering::SeqCst);
    let mut second = AccountRegistry::new(store.clone(), "token").with_outbox(prefs.clone());
    assert_eq!(second.pending_writes(), &[PendingWrite::Upsert(created.clone())]);
    assert_eq!(second.load().await.unwrap(), 1);
    assert_eq!(second.flush_pending().await, 1);
    assert_eq!(store.inner.get(&created.id), Some(created));

    let third = AccountRegistry::new(store.clone(), "token").with_outbox(prefs);
    assert!(third.pending_writes().is_empty());
}
