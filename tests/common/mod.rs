//! Shared helpers for end-to-end tests.
//!
//! Spawns the real `tsqbot` binary against a scratch config and talks to its
//! HTTP surface with `reqwest`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

pub const OK: &str = "error id=0 msg=ok";

/// Reserve a free local port.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("free port addr").port()
}

/// Write a config serving HTTP on `port` into `dir`.
pub fn write_config(dir: &Path, port: u16) -> std::io::Result<PathBuf> {
    let commands = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("commands.json");
    let config_path = dir.join("tsqbot.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[http]
address = "127.0.0.1:{port}"

[database]
path = "{db}"

[bot]
retry_delay_ms = 50
commands_path = "{commands}"
"#,
            db = dir.join("test.db").display(),
            commands = commands.display(),
        ),
    )?;
    Ok(config_path)
}

/// Start the binary with `config_path`.
pub fn spawn_binary(config_path: &Path) -> std::io::Result<Child> {
    Command::new(env!("CARGO_BIN_EXE_tsqbot"))
        .arg(config_path)
        .env("RUST_LOG", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Wait up to `limit` for `child` to exit on its own.
pub fn wait_for_exit(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    while start.elapsed() < limit {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    Ok(None)
}

/// A running bot process.
pub struct TestBot {
    child: Child,
    base: String,
    http: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl TestBot {
    /// Start the bot with an empty credential store.
    pub async fn spawn() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let port = free_port();
        let config_path = write_config(dir.path(), port)?;

        let bot = Self {
            child: spawn_binary(&config_path)?,
            base: format!("http://127.0.0.1:{port}"),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            _dir: dir,
        };
        bot.wait_ready().await?;
        Ok(bot)
    }

    async fn wait_ready(&self) -> anyhow::Result<()> {
        for _ in 0..100 {
            if let Ok(resp) = self.http.get(format!("{}/health", self.base)).send().await
                && resp.status().is_success()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("bot did not answer /health at {}", self.base)
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<(u16, Value)> {
        let resp = self.http.get(format!("{}{path}", self.base)).send().await?;
        Ok((resp.status().as_u16(), resp.json().await?))
    }

    pub async fn post(&self, path: &str, body: Value) -> anyhow::Result<(u16, Value)> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await?;
        Ok((resp.status().as_u16(), resp.json().await?))
    }
}

impl Drop for TestBot {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A scripted ServerQuery endpoint accepting any number of connections.
pub struct FakeQueryServer {
    pub port: u16,
    seen: Arc<Mutex<Vec<String>>>,
}

impl FakeQueryServer {
    /// Answer every connection as a server with one channel and the
    /// connecting query client as its only client.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
        let port = listener.local_addr().expect("fake server addr").port();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&log)));
            }
        });

        Self { port, seen }
    }

    /// Every command line received, across connections.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock").clone()
    }
}

async fn serve(stream: TcpStream, seen: Arc<Mutex<Vec<String>>>) {
    let (read, mut write) = stream.into_split();
    if write
        .write_all(b"TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface.\n\r")
        .await
        .is_err()
    {
        return;
    }

    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = line.split_whitespace().next().unwrap_or_default().to_string();
        let mut replies = match command.as_str() {
            "whoami" => vec!["client_id=5 client_channel_id=1 client_nickname=Bert".to_string()],
            "clientlist" => vec!["clid=5 cid=1 client_nickname=Bert client_type=1".to_string()],
            "channellist" => vec!["cid=1 pid=0 channel_order=0 channel_name=Lobby".to_string()],
            "channelcreate" => vec!["cid=9".to_string()],
            _ => Vec::new(),
        };
        replies.push(OK.to_string());

        seen.lock().expect("seen lock").push(line);
        for reply in replies {
            if write.write_all(format!("{reply}\n\r").as_bytes()).await.is_err() {
                return;
            }
        }
        if command == "quit" {
            return;
        }
    }
}
