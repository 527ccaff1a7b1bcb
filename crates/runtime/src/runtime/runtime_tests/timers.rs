// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! send_after timer delivery and cancellation.

use super::*;

#[tokio::test]
async fn timer_delivers_info_after_delay() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();

    runtime.send_after(&server, json!("tick"), Duration::from_millis(20));

    let mut reply = json!([]);
    for _ in 0..100 {
        reply = runtime.call(&server, json!("log"), None).await.unwrap();
        if !reply.as_array().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(reply, json!([["info", "tick"]]));
}

#[tokio::test]
async fn cancelled_timer_never_fires() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();

    let timer = runtime.send_after(&server, json!("tick"), Duration::from_millis(30));
    assert!(timer.cancel());
    // Second cancel is a no-op.
    assert!(!timer.cancel());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let reply = runtime.call(&server, json!("log"), None).await.unwrap();
    assert_eq!(reply, json!([]));
}

#[tokio::test]
async fn timers_die_with_their_process() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();

    let timer = runtime.send_after(&server, json!("tick"), Duration::from_millis(60));
    runtime.stop(&server, ExitReason::Normal).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    // The timer entry was cancelled during terminate.
    assert!(!timer.cancel());
}
