//! Engine facade: policy resolution, hot reload, metrics wiring.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use datagate_core::{
    DataGateError, FreshnessRule, FreshnessRuleConfig, HitKind, Outcome, SourceId,
    SpecificDataRequest, StrategyPolicy,
};
use datagate_engine::{ConfigHandle, EngineMetrics, StrategyEngine};
use datagate_storage::{CacheStore, InMemoryCacheStore};
use datagate_test_utils::fixtures::{at, clock_at_t0, config_with_policy, entry_at, request, source};
use datagate_test_utils::{wait_until, ManualClock, RecordingSink, ScriptedInvoker};

const API_PATH: &str = "/v1/specific-data";

fn engine(
    policy: StrategyPolicy,
) -> (StrategyEngine, Arc<InMemoryCacheStore>, Arc<ScriptedInvoker>, ManualClock) {
    let store = Arc::new(InMemoryCacheStore::new());
    let invoker = Arc::new(ScriptedInvoker::new());
    let clock = clock_at_t0();
    let config = ConfigHandle::new(config_with_policy(policy)).unwrap();
    let engine = StrategyEngine::builder(store.clone(), invoker.clone(), config)
        .clock(Arc::new(clock.clone()))
        .build();
    (engine, store, invoker, clock)
}

#[tokio::test]
async fn serves_miss_then_fresh_hit() {
    let (engine, _store, invoker, clock) = engine(StrategyPolicy::Passive);

    let first = engine.handle(request(1), source(), API_PATH).await.unwrap();
    assert_eq!(first.outcome, Outcome::CacheMiss);
    assert_eq!(first.policy, StrategyPolicy::Passive);
    assert_eq!(first.config_version, 1);

    clock.advance(Duration::from_secs(30));
    let second = engine.handle(request(1), source(), API_PATH).await.unwrap();
    assert_eq!(second.outcome, Outcome::CacheHit(HitKind::Fresh));
    assert_eq!(second.response, first.response);
    assert_ne!(second.request_id, first.request_id);
    assert_eq!(invoker.calls(), 1);
}

#[tokio::test]
async fn per_source_policy_overrides_default() {
    let (engine, store, _invoker, clock) = engine(StrategyPolicy::Passive);

    let mut config = config_with_policy(StrategyPolicy::Passive);
    config
        .source_policies
        .insert("reports".to_string(), "stale-while-revalidate".to_string());
    engine.config().update(config).unwrap();

    let reports = SourceId::new("reports");
    let key = datagate_core::CacheKey::derive(&reports, &request(1));
    store.put(&key, entry_at(json!("old"), 0)).await.unwrap();
    clock.set(at(70));

    let served = engine.handle(request(1), reports, API_PATH).await.unwrap();
    assert_eq!(served.policy, StrategyPolicy::Active);
    assert_eq!(served.outcome, Outcome::CacheHit(HitKind::Stale));
    assert_eq!(served.response.data, json!("old"));
    assert_eq!(served.diagnostics.get("cache_state").map(String::as_str), Some("stale"));

    let other = engine.handle(request(1), source(), API_PATH).await.unwrap();
    assert_eq!(other.policy, StrategyPolicy::Passive);
}

#[tokio::test]
async fn reload_applies_to_subsequent_requests() {
    let (engine, _store, _invoker, _clock) = engine(StrategyPolicy::Passive);

    let before = engine.handle(request(1), source(), API_PATH).await.unwrap();
    assert_eq!(before.policy, StrategyPolicy::Passive);

    engine
        .config()
        .update(config_with_policy(StrategyPolicy::Active))
        .unwrap();

    let after = engine.handle(request(2), source(), API_PATH).await.unwrap();
    assert_eq!(after.policy, StrategyPolicy::Active);
    assert_eq!(after.config_version, 2);
}

#[tokio::test]
async fn reload_mid_request_keeps_the_admitting_snapshot() {
    let store = Arc::new(InMemoryCacheStore::new());
    let invoker = Arc::new(ScriptedInvoker::held());
    let config = ConfigHandle::new(config_with_policy(StrategyPolicy::Passive)).unwrap();
    let engine = Arc::new(
        StrategyEngine::builder(store.clone(), invoker.clone(), config)
            .clock(Arc::new(clock_at_t0()))
            .build(),
    );

    let snapshot = engine.config().snapshot();
    let task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .handle_with_snapshot(snapshot, request(1), source(), API_PATH)
                .await
        })
    };
    assert!(wait_until(Duration::from_secs(2), || invoker.calls() == 1).await);

    let mut reloaded = config_with_policy(StrategyPolicy::Active);
    reloaded.default_freshness.ttl_secs = 5;
    reloaded.default_freshness.stale_grace_secs = 1;
    assert_eq!(engine.config().update(reloaded).unwrap(), 2);
    invoker.release();

    let served = task.await.unwrap().unwrap();
    assert_eq!(served.policy, StrategyPolicy::Passive);
    assert_eq!(served.config_version, 1);
    assert_eq!(served.outcome, Outcome::CacheMiss);

    let entry = store
        .get(&datagate_core::CacheKey::derive(&source(), &request(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.fresh_until(), at(60));
    assert_eq!(entry.stale_until(), at(90));

    let next = engine.handle(request(2), source(), API_PATH).await.unwrap();
    assert_eq!(next.policy, StrategyPolicy::Active);
    assert_eq!(next.config_version, 2);
}

#[tokio::test]
async fn freshness_rule_follows_data_type() {
    let (engine, store, _invoker, _clock) = engine(StrategyPolicy::Passive);

    let mut config = config_with_policy(StrategyPolicy::Passive);
    config.freshness_rules.insert(
        "ticker".to_string(),
        FreshnessRuleConfig {
            ttl_secs: 5,
            stale_grace_secs: 1,
        },
    );
    engine.config().update(config).unwrap();

    let req = SpecificDataRequest::new("ticker").with_param("symbol", json!("ACME"));
    engine.handle(req.clone(), source(), API_PATH).await.unwrap();

    let entry = store
        .get(&datagate_core::CacheKey::derive(&source(), &req))
        .await
        .unwrap()
        .unwrap();
    let rule = FreshnessRule::from_secs(5, 1);
    assert_eq!(entry.fresh_until(), at(0) + chrono::Duration::from_std(rule.ttl).unwrap());
    assert_eq!(entry.stale_until(), at(6));
}

#[tokio::test]
async fn empty_data_type_is_a_context_error() {
    let (engine, _store, invoker, _clock) = engine(StrategyPolicy::Active);
    let err = engine
        .handle(SpecificDataRequest::new(""), source(), API_PATH)
        .await
        .unwrap_err();
    assert!(matches!(err, DataGateError::Context(_)));
    assert_eq!(invoker.calls(), 0);
}

#[tokio::test]
async fn metrics_count_outcomes_and_refreshes() {
    let store = Arc::new(InMemoryCacheStore::new());
    let invoker = Arc::new(ScriptedInvoker::new());
    let clock = clock_at_t0();
    let metrics = EngineMetrics::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let engine = StrategyEngine::builder(
        store.clone(),
        invoker.clone(),
        ConfigHandle::new(config_with_policy(StrategyPolicy::Active)).unwrap(),
    )
    .clock(Arc::new(clock.clone()))
    .metrics(metrics.clone())
    .sink(sink.clone())
    .build();

    engine.handle(request(1), source(), API_PATH).await.unwrap();
    clock.set(at(70));
    engine.handle(request(1), source(), API_PATH).await.unwrap();
    assert!(sink.wait_for_background(1, Duration::from_secs(2)).await);

    assert_eq!(
        metrics
            .background_refresh_total
            .with_label_values(&["started"])
            .get(),
        1
    );
    assert_eq!(
        sink.request_outcomes(),
        vec![Outcome::CacheMiss, Outcome::CacheHit(HitKind::Stale)]
    );
}

#[tokio::test]
async fn default_sink_is_metrics() {
    let metrics = EngineMetrics::new().unwrap();
    let engine = StrategyEngine::builder(
        Arc::new(InMemoryCacheStore::new()),
        Arc::new(ScriptedInvoker::new()),
        ConfigHandle::new(config_with_policy(StrategyPolicy::Passive)).unwrap(),
    )
    .metrics(metrics.clone())
    .build();

    engine.handle(request(1), source(), API_PATH).await.unwrap();
    assert_eq!(
        metrics
            .strategy_outcomes_total
            .with_label_values(&["passive", "miss"])
            .get(),
        1
    );
}
