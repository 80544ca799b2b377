use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use goldbars::{BalanceAdapter, BrowserBalance, ExtensionBridge, SolverError};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Stand-in for the browser extension: answers every eval with `reply(code)`
async fn fake_extension(bridge: &ExtensionBridge, reply: fn(&str, &str) -> String) {
    let url = format!("ws://{}", bridge.local_addr());
    let (ws, _) = connect_async(url).await.expect("ws connect");
    let (mut writer, mut reader) = ws.split();
    writer
        .send(Message::Text(r#"{"type":"hello","from":"test"}"#.into()))
        .await
        .expect("send hello");

    tokio::spawn(async move {
        while let Some(Ok(msg)) = reader.next().await {
            let txt = msg.into_text().unwrap_or_default();
            let request: serde_json::Value = match serde_json::from_str(&txt) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if request["action"] != "eval" {
                continue;
            }
            let id = request["id"].as_str().unwrap_or_default();
            let code = request["code"].as_str().unwrap_or_default();
            if writer.send(Message::Text(reply(id, code))).await.is_err() {
                break;
            }
        }
    });

    bridge
        .wait_for_client(Duration::from_secs(5))
        .await
        .expect("extension registered");
}

async fn local_bridge() -> ExtensionBridge {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
    ExtensionBridge::start("127.0.0.1:0").await.expect("bind bridge")
}

#[tokio::test]
async fn eval_roundtrip() {
    let bridge = local_bridge().await;
    fake_extension(&bridge, |id, _| {
        serde_json::json!({ "id": id, "ok": true, "result": "ok" }).to_string()
    })
    .await;

    let res = bridge
        .eval_in_active_tab("(()=>{return 'ok';})()", Duration::from_secs(3))
        .await;
    assert_eq!(res, Ok("ok".to_string()));
}

#[tokio::test]
async fn extension_error_is_adapter_error() {
    let bridge = local_bridge().await;
    fake_extension(&bridge, |id, _| {
        serde_json::json!({ "id": id, "ok": false, "error": "ReferenceError: x" }).to_string()
    })
    .await;

    match bridge.eval_in_active_tab("x", Duration::from_secs(3)).await {
        Err(SolverError::Adapter(msg)) => assert!(msg.contains("ReferenceError")),
        other => panic!("Expected Adapter error, got {other:?}"),
    }
}

#[tokio::test]
async fn no_client_is_adapter_error() {
    let bridge = local_bridge().await;
    assert!(!bridge.is_client_connected().await);
    assert!(matches!(
        bridge.eval_in_active_tab("1", Duration::from_millis(200)).await,
        Err(SolverError::Adapter(_))
    ));
}

#[tokio::test]
async fn silent_extension_times_out() {
    let bridge = local_bridge().await;
    fake_extension(&bridge, |_, _| r#"{"type":"pong"}"#.to_string()).await;
    assert!(matches!(
        bridge.eval_in_active_tab("1", Duration::from_millis(200)).await,
        Err(SolverError::Timeout(_))
    ));
}

#[tokio::test]
async fn extension_that_disconnects_mid_eval_cancels_it() {
    let bridge = local_bridge().await;
    let url = format!("ws://{}", bridge.local_addr());
    let (ws, _) = connect_async(url).await.expect("ws connect");
    let (mut writer, mut reader) = ws.split();
    writer
        .send(Message::Text(r#"{"type":"hello","from":"test"}"#.into()))
        .await
        .expect("send hello");
    bridge
        .wait_for_client(Duration::from_secs(5))
        .await
        .expect("extension registered");

    // Take the eval request, then go away without answering.
    tokio::spawn(async move {
        let _ = reader.next().await;
        drop(reader);
        let _ = writer.close().await;
    });

    let res = tokio::time::timeout(
        Duration::from_secs(5),
        bridge.eval_in_active_tab("1", Duration::from_secs(60)),
    )
    .await
    .expect("eval should end when the extension leaves, not at its own timeout");
    match res {
        Err(SolverError::Adapter(msg)) => assert!(msg.contains("dropped"), "{msg}"),
        other => panic!("Expected Adapter error, got {other:?}"),
    }
    assert!(!bridge.is_client_connected().await);
}

#[tokio::test]
async fn browser_balance_reads_results_through_bridge() {
    let bridge = local_bridge().await;
    fake_extension(&bridge, |id, code| {
        let value = if code.contains("querySelectorAll") {
            serde_json::json!(3)
        } else if code.contains("li:last-child") {
            serde_json::json!("[0,1] < [2,3]")
        } else {
            serde_json::Value::Null
        };
        let reply = serde_json::json!({ "ok": true, "value": value }).to_string();
        serde_json::json!({ "id": id, "ok": true, "result": reply }).to_string()
    })
    .await;

    let balance = BrowserBalance::new(bridge).with_eval_timeout(Duration::from_secs(3));
    balance.reset_balance().await.unwrap();
    assert_eq!(balance.result_count().await.unwrap(), 3);
    assert_eq!(balance.latest_result_text().await.unwrap(), "[0,1] < [2,3]");
}
