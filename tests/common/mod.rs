//! Common test utilities
//!
//! Fixtures shared by the integration tests: on-disk queue databases,
//! status frames, and a scripted WebSocket server.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use procurement_offline::client::local_db::LocalDatabase;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Queue database in a fresh temporary directory
///
/// Keep the `TempDir` alive for as long as the database is used.
pub async fn temp_database() -> (TempDir, std::path::PathBuf, LocalDatabase) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue").join("offline.db");
    let db = LocalDatabase::open(&path).await.unwrap();
    (dir, path, db)
}

/// Wire text of one status frame
pub fn frame(task_id: &str, status: &str, progress: u32) -> String {
    json!({
        "task_id": task_id,
        "status": status,
        "progress": progress,
        "message": format!("{} at {}%", status, progress),
        "data": null,
        "timestamp": "2026-01-01T10:00:00Z",
    })
    .to_string()
}

/// What the scripted server does on one connection
#[derive(Debug, Clone)]
pub enum Step {
    /// Push a text message to the client
    Send(String),
    /// Wait for one text message from the client and record it
    Receive,
}

/// A WebSocket server that plays one script per accepted connection, then
/// closes the connection
pub struct ScriptedServer {
    pub base_url: String,
    accepted: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
    received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn start(scripts: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("ws://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let paths = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));

        let (accepted_in, paths_in, received_in) =
            (accepted.clone(), paths.clone(), received.clone());
        let handle = tokio::spawn(async move {
            let mut scripts = VecDeque::from(scripts);
            while let Ok((stream, _)) = listener.accept().await {
                accepted_in.fetch_add(1, Ordering::SeqCst);
                let steps = scripts.pop_front().unwrap_or_default();
                let paths = paths_in.clone();
                let received = received_in.clone();
                tokio::spawn(async move {
                    let record_path = |request: &Request, response: Response| {
                        paths.lock().unwrap().push(request.uri().path().to_string());
                        Ok::<Response, ErrorResponse>(response)
                    };
                    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, record_path).await
                    else {
                        return;
                    };
                    for step in steps {
                        match step {
                            Step::Send(text) => {
                                if ws.send(Message::Text(text)).await.is_err() {
                                    return;
                                }
                            }
                            Step::Receive => loop {
                                match ws.next().await {
                                    Some(Ok(Message::Text(text))) => {
                                        received.lock().unwrap().push(text);
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    _ => return,
                                }
                            },
                        }
                    }
                    let _ = ws.close(None).await;
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        Self {
            base_url,
            accepted,
            paths,
            received,
            handle,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
