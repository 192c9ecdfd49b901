#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use drafter_core::{Arg, ClientConfig, Command, Response, Verb};
use serde_json::{Deserializer, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::sleep,
};

/// What the scripted peer does with one decoded command.
pub enum Reply {
    Json(Response),
    /// Response written in two halves with a pause in between.
    Split(Response),
    Raw(Vec<u8>),
    Silent,
    Hangup,
}

#[derive(Debug, Clone, Default)]
pub struct PeerLog {
    pub accepted: usize,
    pub closed: usize,
    /// Decoded commands tagged with the index of the connection they arrived on.
    pub commands: Vec<(usize, Command)>,
}

impl PeerLog {
    pub fn verbs(&self) -> Vec<Verb> {
        self.commands.iter().map(|(_, command)| command.cmd).collect()
    }
}

type Script = Arc<dyn Fn(&Command) -> Reply + Send + Sync>;

/// In-process drawing server that answers each command from a script.
pub struct ScriptedPeer {
    pub addr: SocketAddr,
    log: Arc<Mutex<PeerLog>>,
    task: JoinHandle<()>,
}

impl ScriptedPeer {
    pub async fn spawn(script: impl Fn(&Command) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have an address");
        let log = Arc::new(Mutex::new(PeerLog::default()));
        let script: Script = Arc::new(script);

        let accept_log = Arc::clone(&log);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = {
                    let mut log = accept_log.lock().expect("peer log should lock");
                    log.accepted += 1;
                    log.accepted - 1
                };
                tokio::spawn(handle_connection(
                    stream,
                    index,
                    Arc::clone(&script),
                    Arc::clone(&accept_log),
                ));
            }
        });

        Self { addr, log, task }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.addr.port())
    }

    pub fn log(&self) -> PeerLog {
        self.log.lock().expect("peer log should lock").clone()
    }

    /// Waits until every accepted connection has been closed by the client.
    pub async fn wait_until_all_closed(&self) -> PeerLog {
        for _ in 0..200 {
            let log = self.log();
            if log.accepted == log.closed {
                return log;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("connections left open: {:?}", self.log());
    }
}

impl Drop for ScriptedPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Answers every command with `ok` and the verb as result.
pub fn echo_ok(command: &Command) -> Reply {
    Reply::Json(Response::ok(
        Some(command.id.clone()),
        Some(json!(command.cmd.as_str())),
    ))
}

/// Returns the numeric arguments of a command, panicking on text.
pub fn numbers(command: &Command) -> Vec<f64> {
    command
        .args
        .iter()
        .map(|arg| match arg {
            Arg::Number(value) => *value,
            Arg::Text(text) => panic!("unexpected text argument {text:?}"),
        })
        .collect()
}

/// Port on which nothing is listening.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    listener
        .local_addr()
        .expect("listener should have an address")
        .port()
}

async fn handle_connection(
    mut stream: TcpStream,
    index: usize,
    script: Script,
    log: Arc<Mutex<PeerLog>>,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];

    'read: loop {
        let read = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        buffer.extend_from_slice(&chunk[..read]);

        loop {
            let (command, consumed) = {
                let mut commands = Deserializer::from_slice(&buffer).into_iter::<Command>();
                match commands.next() {
                    Some(Ok(command)) => (command, commands.byte_offset()),
                    _ => break,
                }
            };
            buffer.drain(..consumed);
            log.lock()
                .expect("peer log should lock")
                .commands
                .push((index, command.clone()));

            let written = match script(&command) {
                Reply::Json(response) => write(&mut stream, &encode(&response)).await,
                Reply::Split(response) => {
                    let bytes = encode(&response);
                    let (head, tail) = bytes.split_at(bytes.len() / 2);
                    let head_written = write(&mut stream, head).await;
                    sleep(Duration::from_millis(30)).await;
                    head_written && write(&mut stream, tail).await
                }
                Reply::Raw(bytes) => write(&mut stream, &bytes).await,
                Reply::Silent => true,
                Reply::Hangup => false,
            };

            if !written {
                break 'read;
            }
        }
    }

    log.lock().expect("peer log should lock").closed += 1;
}

fn encode(response: &Response) -> Vec<u8> {
    serde_json::to_vec(response).expect("response should encode")
}

async fn write(stream: &mut TcpStream, bytes: &[u8]) -> bool {
    stream.write_all(bytes).await.is_ok() && stream.flush().await.is_ok()
}
