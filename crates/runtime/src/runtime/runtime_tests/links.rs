// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Link semantics: symmetric propagation honoring trap_exit.

use super::*;

#[tokio::test]
async fn abnormal_exit_terminates_linked_peer() {
    let runtime = Runtime::new();
    let a = start_counter(&runtime).await;
    let b = start_counter(&runtime).await;
    runtime.link(&a, &b);

    let _ = runtime.call(&b, json!("boom"), None).await;

    let gone = wait_for(Duration::from_millis(500), || {
        (!runtime.is_alive(&a)).then_some(())
    })
    .await;
    assert!(gone.is_some(), "linked peer should terminate");
}

#[tokio::test]
async fn trapping_peer_receives_exit_info_and_survives() {
    let runtime = Runtime::new();
    let coordinator = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default().trap_exit(true))
        .await
        .unwrap();
    let worker = start_counter(&runtime).await;
    runtime.link(&coordinator, &worker);

    let _ = runtime.call(&worker, json!("boom"), None).await;

    let mut log = None;
    for _ in 0..100 {
        let reply = runtime.call(&coordinator, json!("log"), None).await.unwrap();
        let entries = reply.as_array().unwrap().clone();
        if !entries.is_empty() {
            log = Some(entries);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let log = log.expect("coordinator should have logged the exit");
    assert_eq!(log[0][0], json!("info"));
    assert_eq!(log[0][1]["type"], json!("EXIT"));
    assert_eq!(log[0][1]["from"]["id"], json!(worker.id.as_str()));
    assert_eq!(log[0][1]["reason"]["kind"], json!("error"));
    assert_eq!(log[0][1]["reason"]["message"], json!("boom"));
    assert!(runtime.is_alive(&coordinator));
}

#[tokio::test]
async fn normal_exit_does_not_propagate() {
    let runtime = Runtime::new();
    let a = start_counter(&runtime).await;
    let b = start_counter(&runtime).await;
    runtime.link(&a, &b);

    runtime.stop(&b, ExitReason::Normal).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runtime.is_alive(&a));
}

#[tokio::test]
async fn linking_to_dead_process_signals_requester() {
    let runtime = Runtime::new();
    let a = start_counter(&runtime).await;
    let b = start_counter(&runtime).await;
    runtime.stop(&b, ExitReason::Normal).await.unwrap();

    runtime.link(&a, &b);

    let gone = wait_for(Duration::from_millis(500), || {
        (!runtime.is_alive(&a)).then_some(())
    })
    .await;
    assert!(gone.is_some(), "requester should get a noproc exit signal");
}

#[tokio::test]
async fn unlink_removes_propagation_both_ways() {
    let runtime = Runtime::new();
    let a = start_counter(&runtime).await;
    let b = start_counter(&runtime).await;
    let link_id = runtime.link(&a, &b);

    assert!(runtime.unlink(&link_id));
    let _ = runtime.call(&b, json!("boom"), None).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runtime.is_alive(&a));
}
