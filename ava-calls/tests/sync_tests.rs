//! Provider sync integration tests
//!
//! Drives the synchronizer with a fake provider behind a real circuit breaker.

mod helpers;

use std::time::Duration;

use ava_calls::db::{get_call_by_id, get_tenant_calls, scrub_expired_on_read};
use ava_calls::services::{sync_tenant_calls, BreakerState, CircuitBreaker, SyncReport};
use ava_common::{Error, MergePolicy, Result, TenantId};
use chrono::{SecondsFormat, Utc};
use helpers::{test_db, transcript_window, FakeProvider, FakeResponse};
use serde_json::json;
use sqlx::SqlitePool;

fn rfc3339(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn provider_calls() -> Vec<serde_json::Value> {
    let started = Utc::now() - chrono::Duration::hours(1);
    vec![
        json!({
            "id": "vapi-1",
            "assistantId": "asst-1",
            "status": "ended",
            "startedAt": rfc3339(started),
            "endedAt": rfc3339(started + chrono::Duration::seconds(125)),
            "cost": "0.31",
            "customer": {"number": "+15550001"},
            "transcript": "AVA: Hello\n\nCaller: I need an appointment",
        }),
        json!({
            "id": "vapi-2",
            "assistantId": "asst-1",
            "status": "in-progress",
            "startedAt": "not a timestamp",
        }),
        json!({"assistantId": "asst-1", "status": "ended"}),
    ]
}

fn breaker() -> CircuitBreaker {
    CircuitBreaker::new("vapi", 2, Duration::from_secs(60), 1)
}

async fn sync(
    pool: &SqlitePool,
    tenant: &TenantId,
    provider: &FakeProvider,
    breaker: &CircuitBreaker,
    limit: u32,
) -> Result<SyncReport> {
    sync_tenant_calls(
        pool,
        tenant,
        provider,
        breaker,
        limit,
        MergePolicy::LastWriteWins,
        transcript_window(),
    )
    .await
}

#[tokio::test]
async fn test_sync_inserts_then_updates() {
    let pool = test_db().await;
    let tenant = TenantId::new("tenant-a");
    let provider = FakeProvider::new(FakeResponse::Calls(provider_calls()));
    let breaker = breaker();

    let first = sync(&pool, &tenant, &provider, &breaker, 100)
        .await
        .unwrap();
    assert_eq!(first.fetched, 3);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.inserted, 2);
    assert_eq!(first.updated, 0);

    let second = sync(&pool, &tenant, &provider, &breaker, 100)
        .await
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 2);

    let stored = get_call_by_id(&pool, "vapi-1").await.unwrap().unwrap();
    assert_eq!(stored.status, "completed");
    assert_eq!(stored.duration_seconds, Some(125));
    assert_eq!(stored.cost, Some(0.31));
    assert_eq!(stored.customer_number.as_deref(), Some("+15550001"));
    assert_eq!(
        stored.transcript.as_deref(),
        Some("AVA: Hello\n\nCaller: I need an appointment")
    );
    assert!(stored.meta.get("transcript").is_none());

    let all = get_tenant_calls(&pool, &tenant, None, 10).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_sync_respects_limit() {
    let pool = test_db().await;
    let provider = FakeProvider::new(FakeResponse::Calls(provider_calls()));

    let report = sync(&pool, &TenantId::new("tenant-a"), &provider, &breaker(), 1)
        .await
        .unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_upstream_unavailable() {
    let pool = test_db().await;
    let provider = FakeProvider::new(FakeResponse::ServerError);

    let err = sync(&pool, &TenantId::new("tenant-a"), &provider, &breaker(), 100)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn test_open_breaker_short_circuits() {
    let pool = test_db().await;
    let tenant = TenantId::new("tenant-a");
    let provider = FakeProvider::new(FakeResponse::ServerError);
    let breaker = breaker();

    for _ in 0..2 {
        let _ = sync(&pool, &tenant, &provider, &breaker, 100).await;
    }
    assert_eq!(breaker.state(), BreakerState::Open);
    assert_eq!(provider.invocations(), 2);

    let err = sync(&pool, &tenant, &provider, &breaker, 100)
        .await
        .unwrap_err();

    match err {
        Error::ServiceUnavailable {
            service,
            retry_after_secs,
        } => {
            assert_eq!(service, "vapi");
            assert!(retry_after_secs >= 1);
        }
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    assert_eq!(provider.invocations(), 2);
}

#[tokio::test]
async fn test_rejected_key_does_not_trip_breaker() {
    let pool = test_db().await;
    let tenant = TenantId::new("tenant-a");
    let provider = FakeProvider::new(FakeResponse::Unauthorized);
    let breaker = breaker();

    for _ in 0..3 {
        let err = sync(&pool, &tenant, &provider, &breaker, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    assert_eq!(breaker.state(), BreakerState::Closed);
    assert_eq!(provider.invocations(), 3);
}

#[tokio::test]
async fn test_resync_keeps_expired_transcript_scrubbed() {
    let pool = test_db().await;
    let tenant = TenantId::new("tenant-a");
    let now = Utc::now();
    let provider = FakeProvider::new(FakeResponse::Calls(vec![json!({
        "id": "vapi-old",
        "status": "ended",
        "startedAt": rfc3339(now - chrono::Duration::hours(25)),
        "transcript": "Caller: patient wants appointment cancellation",
    })]));
    let breaker = breaker();

    sync(&pool, &tenant, &provider, &breaker, 100).await.unwrap();
    let mut rows = get_tenant_calls(&pool, &tenant, None, 10).await.unwrap();
    let scrubbed = scrub_expired_on_read(&pool, &mut rows, now, transcript_window())
        .await
        .unwrap();
    assert_eq!(scrubbed, 1);

    let report = sync(&pool, &tenant, &provider, &breaker, 100).await.unwrap();
    assert_eq!(report.updated, 1);

    let stored = get_call_by_id(&pool, "vapi-old").await.unwrap().unwrap();
    assert_eq!(stored.transcript, None);
    assert!(stored.meta.get("transcript").is_none());
}
