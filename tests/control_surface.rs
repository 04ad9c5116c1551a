//! End-to-end tests for the HTTP control surface of the real binary.

mod common;

use std::time::Duration;

use common::{FakeQueryServer, TestBot};
use serde_json::json;

#[test]
fn exits_when_http_port_is_taken() -> anyhow::Result<()> {
    let taken = std::net::TcpListener::bind("127.0.0.1:0")?;
    let dir = tempfile::tempdir()?;
    let config = common::write_config(dir.path(), taken.local_addr()?.port())?;

    let mut child = common::spawn_binary(&config)?;
    let status = common::wait_for_exit(&mut child, Duration::from_secs(10))?;
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
    }

    let status = status.expect("bot exits when the HTTP port is taken");
    assert!(!status.success());
    Ok(())
}

#[tokio::test]
async fn starts_offline_without_credentials() -> anyhow::Result<()> {
    let bot = TestBot::spawn().await?;

    let (code, body) = bot.get("/health").await?;
    assert_eq!(code, 200);
    assert_eq!(body, json!({ "status": "ok" }));

    let (code, body) = bot.get("/status").await?;
    assert_eq!(code, 200);
    assert_eq!(body["status"], "offline");

    let (code, body) = bot.get("/settings").await?;
    assert_eq!(code, 200);
    assert_eq!(body, json!({}));

    let (code, _) = bot.post("/command", json!({ "command": "connect" })).await?;
    assert_eq!(code, 409);

    Ok(())
}

#[tokio::test]
async fn rejects_incomplete_settings() -> anyhow::Result<()> {
    let bot = TestBot::spawn().await?;

    let (code, body) = bot
        .post("/settings", json!({ "host": "127.0.0.1", "username": "serveradmin" }))
        .await?;
    assert_eq!(code, 400);
    assert_eq!(body["code"], "invalid_settings");

    let (_, body) = bot.get("/settings").await?;
    assert_eq!(body, json!({}));

    Ok(())
}

#[tokio::test]
async fn settings_connect_and_disconnect_cleanly() -> anyhow::Result<()> {
    let query = FakeQueryServer::start().await;
    let bot = TestBot::spawn().await?;

    let (code, body) = bot
        .post(
            "/settings",
            json!({
                "host": "127.0.0.1",
                "queryport": query.port,
                "username": "serveradmin",
                "password": "secret",
            }),
        )
        .await?;
    assert_eq!(code, 200, "{body}");
    assert_eq!(body["message"], "Settings updated successfully");
    assert_eq!(body["status"]["status"], "online");
    assert_eq!(body["status"]["announcementChannel"], 9);

    let (_, body) = bot.get("/settings").await?;
    assert_eq!(body["queryPort"], query.port);

    let seen = query.seen();
    assert!(seen.iter().any(|l| l.starts_with("login ")));
    assert!(seen.iter().any(|l| l.starts_with("servernotifyregister ")));
    assert!(seen.iter().any(|l| l.starts_with("channelcreate ")));
    assert!(seen.iter().any(|l| l == "clientmove clid=5 cid=9"));

    let (code, body) = bot.post("/command", json!({ "command": "disconnect" })).await?;
    assert_eq!(code, 200);
    assert_eq!(body["message"], "Disconnected successfully");

    let (_, body) = bot.get("/status").await?;
    assert_eq!(body["status"], "offline");
    assert!(query.seen().iter().any(|l| l == "channeldelete cid=9 force=1"));

    Ok(())
}
