mod support;

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use drafter_core::{ClientConfig, FailureKind, Response, Status, Verb};
use drafter_ipc::{BatchReport, DrawingClient};
use support::{Reply, ScriptedPeer, echo_ok, numbers, unused_port};
use tokio::time::timeout;

fn line_coordinates(peer: &ScriptedPeer) -> Vec<Vec<f64>> {
    peer.log()
        .commands
        .iter()
        .filter(|(_, command)| command.cmd == Verb::Line)
        .map(|(_, command)| numbers(command))
        .collect()
}

#[tokio::test]
async fn burst_on_healthy_peer_returns_count_plus_two() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    let results = client.random_primitive_burst(25, -50.0, 50.0).await;

    assert_eq!(results.len(), 27);
    assert_eq!(results[0].status, Status::Ok);
    assert_eq!(results[26].status, Status::Ok);
    assert!(results.iter().all(Response::is_ok));
    assert!(!client.is_connected());

    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.accepted, 1);
    let verbs = log.verbs();
    assert_eq!(verbs.first(), Some(&Verb::BeginBatch));
    assert_eq!(verbs.last(), Some(&Verb::EndBatch));
    assert_eq!(verbs.iter().filter(|verb| **verb == Verb::Line).count(), 25);

    let lines = line_coordinates(&peer);
    assert_eq!(lines.len(), 25);
    for coords in lines {
        assert_eq!(coords.len(), 4);
        assert!(coords.iter().all(|value| (-50.0..=50.0).contains(value)));
    }
}

#[tokio::test]
async fn failed_begin_returns_single_result_and_closes() {
    let peer = ScriptedPeer::spawn(|command| match command.cmd {
        Verb::BeginBatch => Reply::Json(Response::rejected(
            Some(command.id.clone()),
            "batch already open",
        )),
        _ => echo_ok(command),
    })
    .await;
    let mut client = DrawingClient::new(peer.config());

    let results = client.random_primitive_burst(10, -50.0, 50.0).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Error);
    let message = results[0].error_or("");
    assert!(message.contains("failed to start batch mode"), "{message}");
    assert!(message.contains("batch already open"), "{message}");
    assert!(!client.is_connected());

    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.accepted, 1);
    assert_eq!(log.verbs(), vec![Verb::BeginBatch, Verb::EndBatch]);
}

#[tokio::test]
async fn mid_batch_failures_do_not_abort_the_loop() {
    let lines_seen = AtomicUsize::new(0);
    let peer = ScriptedPeer::spawn(move |command| match command.cmd {
        Verb::Line if (lines_seen.fetch_add(1, Ordering::SeqCst) + 1) % 3 == 0 => Reply::Json(
            Response::rejected(Some(command.id.clone()), "entity limit reached"),
        ),
        _ => echo_ok(command),
    })
    .await;
    let mut client = DrawingClient::new(peer.config());

    let results = client.random_primitive_burst(10, 0.0, 1.0).await;

    assert_eq!(results.len(), 12);
    let rejected: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, response)| !response.is_ok())
        .map(|(index, _)| index)
        .collect();
    assert_eq!(rejected, vec![3, 6, 9]);
    assert!(results[11].is_ok());

    let report = BatchReport::from_results(10, &results);
    assert_eq!(report.created, 7);
    assert!(report.committed);

    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.verbs().last(), Some(&Verb::EndBatch));
    assert_eq!(log.commands.len(), 12);
}

#[tokio::test]
async fn seeded_bursts_are_reproducible() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    client
        .random_primitive_burst_seeded(5, -100.0, 100.0, 42)
        .await;
    let first = line_coordinates(&peer);
    client
        .random_primitive_burst_seeded(5, -100.0, 100.0, 42)
        .await;
    let both = line_coordinates(&peer);

    assert_eq!(first.len(), 5);
    assert_eq!(both.len(), 10);
    assert_eq!(&both[..5], &both[5..]);
}

#[tokio::test]
async fn unusable_range_fails_without_connecting() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    let results = client.random_primitive_burst(5, 10.0, -10.0).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].failure, Some(FailureKind::InvalidArgument));
    assert_eq!(peer.log().accepted, 0);
}

#[tokio::test]
async fn burst_without_server_reports_start_failure() {
    let port = unused_port().await;
    let mut client = DrawingClient::new(ClientConfig::new("127.0.0.1", port));

    let results = client.random_primitive_burst(5, -1.0, 1.0).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_unavailable());
    assert!(results[0].error_or("").contains("failed to start batch mode"));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn manual_batch_stays_on_one_connection() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    assert!(client.begin_batch().await.is_ok());
    assert!(client.is_connected());
    assert!(client.batch_line(0.0, 0.0, 10.0, 10.0).await.is_ok());
    assert!(client.batch_line(10.0, 10.0, 20.0, 0.0).await.is_ok());
    assert!(client.end_batch().await.is_ok());
    assert!(!client.is_connected());

    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.accepted, 1);
    assert_eq!(
        log.verbs(),
        vec![Verb::BeginBatch, Verb::Line, Verb::Line, Verb::EndBatch]
    );
}

#[tokio::test]
async fn cancelled_burst_closes_its_connection() {
    let peer = ScriptedPeer::spawn(|command| match command.cmd {
        Verb::Line => Reply::Silent,
        _ => echo_ok(command),
    })
    .await;
    let mut client = DrawingClient::new(peer.config());

    let outcome = timeout(
        Duration::from_millis(300),
        client.random_primitive_burst(5, -1.0, 1.0),
    )
    .await;

    assert!(outcome.is_err(), "burst should still be waiting on a LINE reply");
    assert!(!client.is_connected());
    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.accepted, 1);
    assert_eq!(log.verbs(), vec![Verb::BeginBatch, Verb::Line]);
}

#[tokio::test]
async fn batch_session_commits_on_finish() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    let mut session = client.open_batch().await.expect("batch should open");
    assert!(session.begin().is_ok());
    assert!(session.line(0.0, 0.0, 1.0, 1.0).await.is_ok());
    assert!(session.line(1.0, 1.0, 2.0, 0.0).await.is_ok());
    let end = session.finish().await;

    assert!(end.is_ok());
    assert!(!client.is_connected());
    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.accepted, 1);
    assert_eq!(
        log.verbs(),
        vec![Verb::BeginBatch, Verb::Line, Verb::Line, Verb::EndBatch]
    );
}

#[tokio::test]
async fn dropped_batch_session_closes_without_committing() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    {
        let mut session = client.open_batch().await.expect("batch should open");
        assert!(session.line(5.0, 5.0, 6.0, 6.0).await.is_ok());
    }

    assert!(!client.is_connected());
    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.verbs(), vec![Verb::BeginBatch, Verb::Line]);
}

#[tokio::test]
async fn refused_batch_session_reports_start_failure() {
    let peer = ScriptedPeer::spawn(|command| match command.cmd {
        Verb::BeginBatch => Reply::Json(Response::rejected(Some(command.id.clone()), "read-only")),
        _ => echo_ok(command),
    })
    .await;
    let mut client = DrawingClient::new(peer.config());

    let failed = match client.open_batch().await {
        Ok(_) => panic!("batch should not open"),
        Err(response) => response,
    };

    assert!(failed.error_or("").contains("failed to start batch mode: read-only"));
    assert!(!client.is_connected());
    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.verbs(), vec![Verb::BeginBatch, Verb::EndBatch]);
}

#[tokio::test]
async fn single_shot_command_during_batch_uses_its_own_connection() {
    let peer = ScriptedPeer::spawn(echo_ok).await;
    let mut client = DrawingClient::new(peer.config());

    assert!(client.begin_batch().await.is_ok());
    assert!(client.ping().await.is_ok());
    assert!(client.is_connected());
    assert!(client.batch_line(0.0, 0.0, 3.0, 4.0).await.is_ok());
    assert!(client.end_batch().await.is_ok());

    let log = peer.wait_until_all_closed().await;
    assert_eq!(log.accepted, 2);
    let on_batch: Vec<Verb> = log
        .commands
        .iter()
        .filter(|(index, _)| *index == 0)
        .map(|(_, command)| command.cmd)
        .collect();
    assert_eq!(on_batch, vec![Verb::BeginBatch, Verb::Line, Verb::EndBatch]);
    assert!(
        log.commands
            .iter()
            .any(|(index, command)| *index == 1 && command.cmd == Verb::Ping)
    );
}
