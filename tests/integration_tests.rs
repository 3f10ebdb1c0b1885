//! Integration tests for the quake sidecar
//!
//! These tests drive the monitoring loops against scripted collaborators:
//! - Status poll cycles feeding metrics and player registration
//! - Health monitor escalation and recovery
//! - Cooperative cancellation of both loops

mod fixtures;

use quake_sidecar::error::SidecarError;
use quake_sidecar::metrics::MetricsSink;
use quake_sidecar::monitor::{HealthMonitor, MonitorExit, PollOutcome, StatusPoller};
use quake_sidecar::status::Quake3StatusClient;
use quake_sidecar::types::{HealthStatus, PlayerSnapshot, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use fixtures::{q3dm1_snapshot, ScriptedOrchestrator, ScriptedStatusSource};

const ADDRESS: &str = "127.0.0.1:27960";

fn poller(
    source: Arc<ScriptedStatusSource>,
    sink: Arc<MetricsSink>,
    orchestrator: Arc<ScriptedOrchestrator>,
) -> StatusPoller {
    StatusPoller::new(source, sink, orchestrator, ADDRESS, Duration::from_secs(5))
}

#[tokio::test]
async fn test_poll_cycle_reports_metrics_and_registers_players() {
    let source = Arc::new(ScriptedStatusSource::always(Ok(q3dm1_snapshot())));
    let sink = Arc::new(MetricsSink::new().unwrap());
    let orchestrator = Arc::new(ScriptedOrchestrator::new());

    let outcome = poller(source.clone(), sink.clone(), orchestrator.clone())
        .poll_once()
        .await;

    assert_eq!(
        outcome,
        PollOutcome::Reported {
            players: 2,
            registered: 2
        }
    );
    assert_eq!(source.queries(), 1);
    assert_eq!(sink.active_players(), 2.0);
    assert_eq!(sink.score("Ann", "q3dm1"), Some(10.0));
    assert_eq!(sink.score("Bob", "q3dm1"), Some(-1.0));
    assert_eq!(sink.ping("Ann"), Some(40.0));
    assert_eq!(sink.ping("Bob"), Some(999.0));
    assert_eq!(orchestrator.connect_calls(), vec!["Ann", "Bob"]);
}

#[tokio::test]
async fn test_unreachable_server_leaves_metrics_untouched() {
    let source = Arc::new(ScriptedStatusSource::always(Err(SidecarError::unreachable(
        ADDRESS,
        "connection refused",
    ))));
    let sink = Arc::new(MetricsSink::new().unwrap());
    sink.report(&q3dm1_snapshot());
    let before = sink.render().unwrap();
    let orchestrator = Arc::new(ScriptedOrchestrator::new());

    let outcome = poller(source, sink.clone(), orchestrator.clone())
        .poll_once()
        .await;

    assert!(matches!(
        outcome,
        PollOutcome::Skipped(SidecarError::Unreachable { .. })
    ));
    assert_eq!(sink.render().unwrap(), before);
    assert!(orchestrator.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_reply_leaves_metrics_untouched() {
    let source = Arc::new(ScriptedStatusSource::always(Err(SidecarError::malformed(
        "missing statusResponse header",
    ))));
    let sink = Arc::new(MetricsSink::new().unwrap());
    sink.report(&q3dm1_snapshot());
    let before = sink.render().unwrap();
    let orchestrator = Arc::new(ScriptedOrchestrator::new());

    let outcome = poller(source, sink.clone(), orchestrator.clone())
        .poll_once()
        .await;

    assert!(matches!(
        outcome,
        PollOutcome::Skipped(SidecarError::MalformedReply { .. })
    ));
    assert_eq!(sink.render().unwrap(), before);
    assert!(orchestrator.connect_calls().is_empty());
}

#[tokio::test]
async fn test_failed_registration_does_not_stop_other_players() {
    let snapshot = StatusSnapshot::new(
        "q3dm17",
        vec![
            PlayerSnapshot::new("Ann", 3, 20),
            PlayerSnapshot::new("Bob", 5, 30),
            PlayerSnapshot::new("Cid", 7, 50),
        ],
    );
    let source = Arc::new(ScriptedStatusSource::always(Ok(snapshot)));
    let sink = Arc::new(MetricsSink::new().unwrap());
    let orchestrator = Arc::new(ScriptedOrchestrator::new());
    orchestrator.reject_player("Bob");

    let outcome = poller(source, sink.clone(), orchestrator.clone())
        .poll_once()
        .await;

    assert_eq!(
        outcome,
        PollOutcome::Reported {
            players: 3,
            registered: 2
        }
    );
    assert_eq!(orchestrator.connect_calls(), vec!["Ann", "Cid"]);
    // Metrics were applied before registration was attempted
    assert_eq!(sink.score("Bob", "q3dm17"), Some(5.0));
    assert_eq!(sink.ping("Bob"), Some(30.0));
    assert_eq!(sink.active_players(), 3.0);
}

#[tokio::test]
async fn test_skipped_cycle_recovers_on_next_poll() {
    let source = Arc::new(ScriptedStatusSource::always(Ok(q3dm1_snapshot())));
    source.push_reply(Err(SidecarError::unreachable(ADDRESS, "no reply within 3s")));
    let sink = Arc::new(MetricsSink::new().unwrap());
    let orchestrator = Arc::new(ScriptedOrchestrator::new());
    let poller = poller(source, sink.clone(), orchestrator);

    assert!(matches!(poller.poll_once().await, PollOutcome::Skipped(_)));
    assert_eq!(sink.active_players(), 0.0);

    assert!(matches!(
        poller.poll_once().await,
        PollOutcome::Reported { players: 2, .. }
    ));
    assert_eq!(sink.active_players(), 2.0);
}

#[tokio::test]
async fn test_poll_cycle_against_udp_server() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let address = server.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        let (_, peer) = server.recv_from(&mut buf).await.unwrap();
        let reply = b"\xff\xff\xff\xffstatusResponse\n\\sv_hostname\\arena\\mapname\\q3dm6\n\
                      12 48 \"Ann\"\n0 999 \"Bob\"\n";
        server.send_to(reply, peer).await.unwrap();
    });

    let source = Arc::new(Quake3StatusClient::new(Duration::from_secs(2)));
    let sink = Arc::new(MetricsSink::new().unwrap());
    let orchestrator = Arc::new(ScriptedOrchestrator::new());
    let poller = StatusPoller::new(
        source,
        sink.clone(),
        orchestrator.clone(),
        address,
        Duration::from_secs(5),
    );

    let outcome = poller.poll_once().await;

    assert_eq!(
        outcome,
        PollOutcome::Reported {
            players: 2,
            registered: 2
        }
    );
    assert_eq!(sink.score("Ann", "q3dm6"), Some(12.0));
    assert_eq!(sink.ping("Bob"), Some(999.0));
    assert_eq!(orchestrator.connect_calls(), vec!["Ann", "Bob"]);
}

#[tokio::test(start_paused = true)]
async fn test_health_monitor_turns_fatal_after_threshold() {
    let orchestrator = Arc::new(ScriptedOrchestrator::failing_health());
    let monitor = HealthMonitor::new(orchestrator.clone(), Duration::from_secs(2), 5);
    let status = monitor.subscribe();

    let exit = monitor.run(CancellationToken::new()).await;

    match exit {
        MonitorExit::Fatal {
            failures,
            last_error,
        } => {
            assert_eq!(failures, 6);
            assert!(last_error.is_transport());
        }
        other => panic!("expected fatal exit, got {:?}", other),
    }
    assert_eq!(orchestrator.health_calls(), 6);
    assert_eq!(*status.borrow(), HealthStatus::Fatal { failures: 6 });
}

#[tokio::test(start_paused = true)]
async fn test_health_monitor_success_resets_failures() {
    let mut script = vec![false; 5];
    script.push(true);
    script.extend(vec![false; 5]);
    let orchestrator = Arc::new(ScriptedOrchestrator::with_health_script(script));
    let monitor = HealthMonitor::new(orchestrator.clone(), Duration::from_secs(2), 5);
    let status = monitor.subscribe();
    let token = CancellationToken::new();

    let handle = tokio::spawn(monitor.run(token.clone()));
    // Ticks at 0s, 2s, ... 20s cover the whole script
    tokio::time::sleep(Duration::from_secs(21)).await;
    token.cancel();

    assert_eq!(handle.await.unwrap(), MonitorExit::Cancelled);
    assert!(orchestrator.health_calls() >= 11);
    assert!(!status.borrow().is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_both_loops() {
    let orchestrator = Arc::new(ScriptedOrchestrator::new());
    let source = Arc::new(ScriptedStatusSource::always(Ok(q3dm1_snapshot())));
    let sink = Arc::new(MetricsSink::new().unwrap());
    let token = CancellationToken::new();

    let monitor = HealthMonitor::new(orchestrator.clone(), Duration::from_secs(2), 5);
    let poller = poller(source.clone(), sink, orchestrator.clone());
    let health_task = tokio::spawn(monitor.run(token.clone()));
    let status_task = tokio::spawn(poller.run(token.clone()));

    tokio::time::sleep(Duration::from_secs(11)).await;
    token.cancel();

    let exit = tokio::time::timeout(Duration::from_secs(5), health_task)
        .await
        .expect("health monitor did not stop")
        .unwrap();
    assert_eq!(exit, MonitorExit::Cancelled);
    tokio::time::timeout(Duration::from_secs(5), status_task)
        .await
        .expect("status poller did not stop")
        .unwrap();

    let health_calls = orchestrator.health_calls();
    let queries = source.queries();
    assert!(health_calls >= 6);
    assert!(queries >= 3);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(orchestrator.health_calls(), health_calls);
    assert_eq!(source.queries(), queries);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_tick_makes_no_calls() {
    let orchestrator = Arc::new(ScriptedOrchestrator::new());
    let monitor = HealthMonitor::new(orchestrator.clone(), Duration::from_secs(2), 5);
    let token = CancellationToken::new();
    token.cancel();

    assert_eq!(monitor.run(token).await, MonitorExit::Cancelled);
    assert_eq!(orchestrator.health_calls(), 0);
}
