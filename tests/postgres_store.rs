//! Postgres-backed store checks. Set `AUTHX_TEST_DSN` to run them.

use anyhow::{Context, Result};
use authx::{
    identity::{
        models::{Account, LoginIdentifier, NewBan, SessionRecord},
        sequence::SequenceAllocator,
    },
    store::{
        AccountStore, BanStore, CounterStore, InsertOutcome, PgStore, SessionStore, Store,
        DEFAULT_STORE_TIMEOUT,
    },
};
use chrono::{Duration as ChronoDuration, Utc};
use std::{collections::HashSet, sync::Arc};
use uuid::Uuid;

async fn store() -> Result<Option<PgStore>> {
    let Ok(dsn) = std::env::var("AUTHX_TEST_DSN") else {
        eprintln!("Skipping integration test: AUTHX_TEST_DSN is not set");
        return Ok(None);
    };
    let store = PgStore::connect(&dsn, DEFAULT_STORE_TIMEOUT)
        .await
        .context("Failed to connect to AUTHX_TEST_DSN")?;
    store.migrate().await?;
    Ok(Some(store))
}

fn account(id: i64) -> Account {
    let suffix = Uuid::new_v4().simple().to_string();
    Account {
        id,
        username: format!("it_{}", &suffix[..12]),
        email: format!("it_{}@example.com", &suffix[..12]),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$placeholder".to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn counters_create_once_and_increment() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let name = format!("it-{}", Uuid::new_v4());

    assert_eq!(store.increment_counter(&name).await?, None);
    assert!(store.create_counter(&name).await?);
    assert!(!store.create_counter(&name).await?);
    assert_eq!(store.increment_counter(&name).await?, Some(2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocation_is_unique() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let allocator = Arc::new(SequenceAllocator::new(Arc::new(store), DEFAULT_STORE_TIMEOUT));
    let name = format!("it-{}", Uuid::new_v4());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let allocator = allocator.clone();
        let name = name.clone();
        handles.push(tokio::spawn(async move { allocator.next(&name).await }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let value = handle.await??;
        assert!(seen.insert(value), "duplicate id {value}");
    }
    assert_eq!(seen, (1..=32).collect::<HashSet<i64>>());
    Ok(())
}

#[tokio::test]
async fn accounts_insert_and_lookup() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let id = i64::from(rand_user());
    let alice = account(id);

    assert!(!store.account_exists(&alice.username, &alice.email).await?);
    assert_eq!(store.insert_account(&alice).await?, InsertOutcome::Created);
    assert!(store.account_exists(&alice.username, "other@example.com").await?);

    let mut clash = account(id + 1);
    clash.email.clone_from(&alice.email);
    assert_eq!(store.insert_account(&clash).await?, InsertOutcome::Conflict);

    for identifier in [
        LoginIdentifier::Id(id),
        LoginIdentifier::Email(alice.email.clone()),
        LoginIdentifier::Username(alice.username.clone()),
    ] {
        let found = store.find_account(&identifier).await?;
        assert_eq!(found.map(|a| a.id), Some(id));
    }
    Ok(())
}

#[tokio::test]
async fn sessions_extend_and_expire() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user_id = i64::from(rand_user());
    let now = Utc::now();
    let live = SessionRecord {
        token_id: Uuid::new_v4().to_string(),
        user_id,
        expires_at: now + ChronoDuration::hours(1),
    };
    let stale = SessionRecord {
        token_id: Uuid::new_v4().to_string(),
        user_id,
        expires_at: now - ChronoDuration::seconds(1),
    };
    store.insert_session(&live).await?;
    store.insert_session(&stale).await?;

    assert!(store.find_session(&live.token_id, user_id + 1).await?.is_none());

    let later = now + ChronoDuration::hours(2);
    store.extend_session(&live.token_id, user_id, later).await?;
    let found = store
        .find_session(&live.token_id, user_id)
        .await?
        .context("live session")?;
    assert_eq!(found.expires_at.timestamp(), later.timestamp());

    assert!(store.delete_expired_sessions(now).await? >= 1);
    assert!(store.find_session(&stale.token_id, user_id).await?.is_none());

    assert_eq!(store.delete_user_sessions(user_id).await?, 1);
    assert!(!store.delete_session(&live.token_id).await?);
    Ok(())
}

#[tokio::test]
async fn bans_are_append_only() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user_id = i64::from(rand_user());
    let now = Utc::now();

    let first = store
        .insert_ban(
            &NewBan {
                user_id,
                banned_by: None,
                reason: Some("spam".to_string()),
                ban_end: Some(now + ChronoDuration::days(1)),
            },
            now,
        )
        .await?;
    assert!(first.is_active);

    let active = store.find_active_ban(user_id, now).await?.context("active ban")?;
    assert_eq!(active.ban_id, first.ban_id);
    assert!(store
        .find_active_ban(user_id, now + ChronoDuration::days(2))
        .await?
        .is_none());

    assert_eq!(store.deactivate_bans(user_id, now).await?, 1);
    assert!(store.find_active_ban(user_id, now).await?.is_none());

    let history = store.list_bans(user_id).await?;
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_active);

    store.ping().await?;
    Ok(())
}

// High range keeps these rows apart from accounts allocated by other tests.
fn rand_user() -> u32 {
    let bytes = Uuid::new_v4().into_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) | 0x8000_0000
}
