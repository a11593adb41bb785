//! Contract Test: Shutdown Determinism
//!
//! Verifies that cancellation stops the engine promptly and completely.
//!
//! Constraints verified:
//! - Engine terminates when the token is cancelled
//! - Stopped is the last event emitted
//! - A pass in progress finishes its restart before the engine stops
//! - No pass starts after cancellation
//!
//! If this test fails, someone has added:
//! - A loop that ignores cancellation
//! - Cancellation that aborts a restart midway
//! - Detached background tasks

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wg_ddns_core::{EngineEvent, MonitorEngine};

fn drain(events: &mut tokio::sync::mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn cancellation_terminates_engine() {
    let resolver = ScriptedResolver::new();
    let manager = MockServiceManager::new(Vec::new());
    let dir = ConfigDir::new();

    let config = minimal_config(&dir, None);
    let (engine, mut events) =
        MonitorEngine::new(&config, Arc::new(manager), Arc::new(resolver)).unwrap();
    engine.discover().await.unwrap();

    let token = CancellationToken::new();
    let engine_handle = tokio::spawn({
        let token = token.clone();
        async move { engine.run(token).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");

    let engine_result = result.unwrap().unwrap();
    assert!(
        engine_result.is_ok(),
        "Engine should shut down successfully: {:?}",
        engine_result
    );

    let seen = drain(&mut events);
    assert_eq!(seen.first(), Some(&EngineEvent::Started { endpoints: 0 }));
    assert!(matches!(seen.last(), Some(EngineEvent::Stopped { .. })));
}

#[tokio::test]
async fn already_cancelled_token_runs_no_pass() {
    let resolver = ScriptedResolver::new();
    resolver.set("vpn.example.com", [1, 2, 3, 4]);
    let manager = MockServiceManager::new(vec![tunnel_unit("wg0")]);
    let dir = ConfigDir::new();
    dir.write_tunnel("wg0", "vpn.example.com:51820");

    let config = minimal_config(&dir, None);
    let (engine, mut events) =
        MonitorEngine::new(&config, Arc::new(manager), Arc::new(resolver.clone())).unwrap();
    engine.discover().await.unwrap();
    let lookups_after_discovery = resolver.call_count();

    let token = CancellationToken::new();
    token.cancel();
    engine.run(token).await.unwrap();

    assert_eq!(resolver.call_count(), lookups_after_discovery);
    assert!(
        !drain(&mut events)
            .iter()
            .any(|e| matches!(e, EngineEvent::PassStarted))
    );
}

#[tokio::test]
async fn pass_in_progress_completes_before_stop() {
    let resolver = ScriptedResolver::new();
    resolver.set("vpn.example.com", [1, 2, 3, 4]);
    let manager = MockServiceManager::new(vec![tunnel_unit("wg0")])
        .with_restart_delay(Duration::from_millis(300));
    let dir = ConfigDir::new();
    dir.write_tunnel("wg0", "vpn.example.com:51820");

    let config = minimal_config(&dir, None);
    let (engine, mut events) = MonitorEngine::new(
        &config,
        Arc::new(manager.clone()),
        Arc::new(resolver.clone()),
    )
    .unwrap();
    engine.discover().await.unwrap();
    resolver.set("vpn.example.com", [5, 6, 7, 8]);

    tokio::time::pause();

    let token = CancellationToken::new();
    let engine_handle = tokio::spawn({
        let token = token.clone();
        async move { engine.run(token).await }
    });

    // First tick at 1s; the restart job runs until 1.3s
    tokio::time::sleep(Duration::from_millis(1100)).await;
    token.cancel();
    engine_handle.await.unwrap().unwrap();

    assert_eq!(manager.restart_call_count(), 1);

    let seen = drain(&mut events);
    let succeeded = seen
        .iter()
        .position(|e| matches!(e, EngineEvent::RestartSucceeded { .. }))
        .expect("restart finished");
    let stopped = seen
        .iter()
        .position(|e| matches!(e, EngineEvent::Stopped { .. }))
        .expect("engine stopped");
    assert!(succeeded < stopped);
    assert_eq!(stopped, seen.len() - 1);
}
