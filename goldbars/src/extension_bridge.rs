use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::browser::ScriptRunner;
use crate::SolverError;

pub const DEFAULT_WS_ADDR: &str = "127.0.0.1:17373";

type BridgeResult = Result<serde_json::Value, String>;
type PendingMap = HashMap<String, PendingEval>;
type Pending = Arc<Mutex<PendingMap>>;
type Clients = Arc<Mutex<Vec<Client>>>;

#[derive(Debug, Serialize, Deserialize)]
struct EvalRequest {
    id: String,
    action: String,
    code: String,
    #[serde(default)]
    await_promise: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum BridgeIncoming {
    EvalResult {
        id: String,
        ok: bool,
        result: Option<serde_json::Value>,
        error: Option<String>,
    },
    Typed(TypedIncoming),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum TypedIncoming {
    #[serde(rename = "hello")]
    Hello { from: Option<String> },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "console_event")]
    ConsoleEvent {
        id: String,
        level: Option<String>,
        args: Option<serde_json::Value>,
        ts: Option<f64>,
    },
    #[serde(rename = "exception_event")]
    ExceptionEvent {
        id: String,
        details: Option<serde_json::Value>,
    },
}

struct Client {
    id: Uuid,
    sender: mpsc::UnboundedSender<Message>,
}

/// An eval waiting for its result, tied to the client it was sent to
struct PendingEval {
    client: Uuid,
    reply: oneshot::Sender<BridgeResult>,
}

/// WebSocket endpoint a browser extension connects to.
///
/// The extension evaluates whatever code it is sent in the active tab and
/// answers with an `EvalResult` carrying the same id.
pub struct ExtensionBridge {
    _server_task: JoinHandle<()>,
    addr: SocketAddr,
    clients: Clients,
    pending: Pending,
}

static GLOBAL: OnceCell<Arc<ExtensionBridge>> = OnceCell::new();

impl ExtensionBridge {
    /// Shared bridge on [`DEFAULT_WS_ADDR`], started on first use
    pub async fn global() -> Result<Arc<ExtensionBridge>, SolverError> {
        if let Some(h) = GLOBAL.get() {
            return Ok(h.clone());
        }
        let bridge = Arc::new(ExtensionBridge::start(DEFAULT_WS_ADDR).await?);
        let _ = GLOBAL.set(bridge.clone());
        Ok(bridge)
    }

    pub async fn start(addr: &str) -> Result<ExtensionBridge, SolverError> {
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::warn!(%addr, ?e, "Port in use, waiting 2 seconds and retrying once...");
                tokio::time::sleep(Duration::from_secs(2)).await;
                TcpListener::bind(addr).await.map_err(|e2| {
                    tracing::error!(%addr, ?e2, "Failed to bind after retry");
                    SolverError::Adapter(format!("bridge bind {addr}: {e2}"))
                })?
            }
            Err(e) => return Err(SolverError::Adapter(format!("bridge bind {addr}: {e}"))),
        };
        let addr = listener
            .local_addr()
            .map_err(|e| SolverError::Adapter(format!("bridge local addr: {e}")))?;
        tracing::info!("Goldbars extension bridge listening on {}", addr);

        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let clients_clone = clients.clone();
        let pending_clone = pending.clone();

        let server_task = tokio::spawn(async move {
            loop {
                let (stream, _peer) = match listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("ws accept error: {}", e);
                        continue;
                    }
                };
                tokio::spawn(serve_client(stream, clients_clone.clone(), pending_clone.clone()));
            }
        });

        Ok(ExtensionBridge {
            _server_task: server_task,
            addr,
            clients,
            pending,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn is_client_connected(&self) -> bool {
        !self.clients.lock().await.is_empty()
    }

    /// Wait up to `timeout` for an extension to connect
    pub async fn wait_for_client(&self, timeout: Duration) -> Result<(), SolverError> {
        let step = Duration::from_millis(500);
        let mut waited = Duration::ZERO;
        while !self.is_client_connected().await {
            if waited >= timeout {
                return Err(SolverError::Timeout(format!(
                    "no browser extension connected to {} after {timeout:?}",
                    self.addr
                )));
            }
            tokio::time::sleep(step).await;
            waited += step;
        }
        Ok(())
    }

    pub async fn eval_in_active_tab(
        &self,
        code: &str,
        timeout: Duration,
    ) -> Result<String, SolverError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel::<BridgeResult>();
        let req = EvalRequest {
            id: id.clone(),
            action: "eval".into(),
            code: code.to_string(),
            await_promise: true,
        };
        let payload = serde_json::to_string(&req)
            .map_err(|e| SolverError::Adapter(format!("bridge serialize: {e}")))?;

        let sent = {
            let clients = self.clients.lock().await;
            tracing::debug!(clients = clients.len(), preview = %payload.chars().take(120).collect::<String>(), "Sending eval to extension");
            match clients.first() {
                Some(client) => {
                    self.pending.lock().await.insert(
                        id.clone(),
                        PendingEval {
                            client: client.id,
                            reply: tx,
                        },
                    );
                    client.sender.send(Message::Text(payload)).is_ok()
                }
                None => false,
            }
        };
        if !sent {
            self.pending.lock().await.remove(&id);
            return Err(SolverError::Adapter(
                "no browser extension connected to the bridge".into(),
            ));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(val))) => Ok(match val {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            Ok(Ok(Err(err))) => Err(SolverError::Adapter(format!("script error: {err}"))),
            Ok(Err(_canceled)) => Err(SolverError::Adapter(
                "extension dropped the evaluation".into(),
            )),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                tracing::warn!("ExtensionBridge: timed out waiting for EvalResult (id={})", id);
                Err(SolverError::Timeout(format!(
                    "no EvalResult for {id} within {timeout:?}"
                )))
            }
        }
    }
}

#[async_trait::async_trait]
impl ScriptRunner for ExtensionBridge {
    async fn run_script(&self, code: &str, timeout: Duration) -> Result<String, SolverError> {
        self.eval_in_active_tab(code, timeout).await
    }
}

async fn serve_client(stream: TcpStream, clients: Clients, pending: Pending) {
    let ws_stream = match accept_async(stream).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("ws handshake error: {}", e);
            return;
        }
    };
    let (mut sink, mut stream) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                tracing::warn!("ws send error: {}", e);
                break;
            }
        }
    });

    let client_id = Uuid::new_v4();
    clients.lock().await.push(Client {
        id: client_id,
        sender: tx,
    });

    while let Some(Ok(msg)) = stream.next().await {
        if !msg.is_text() {
            continue;
        }
        let txt = msg.into_text().unwrap_or_default();
        match serde_json::from_str::<BridgeIncoming>(&txt) {
            Ok(BridgeIncoming::EvalResult {
                id,
                ok,
                result,
                error,
            }) => {
                if ok {
                    tracing::debug!(id = %id, "Bridge received EvalResult");
                } else {
                    let head: String = error.as_deref().unwrap_or("").chars().take(400).collect();
                    tracing::error!(id = %id, error = %head, "Bridge received EvalResult error");
                }
                if let Some(waiter) = pending.lock().await.remove(&id) {
                    let _ = waiter.reply.send(if ok {
                        Ok(result.unwrap_or(serde_json::Value::Null))
                    } else {
                        Err(error.unwrap_or_else(|| "unknown error".into()))
                    });
                }
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::ConsoleEvent {
                id,
                level,
                args,
                ts,
            })) => {
                let args_str = args.map(|v| v.to_string()).unwrap_or_else(|| "[]".into());
                let ts_ms = ts.unwrap_or(0.0);
                match level.as_deref().unwrap_or("log") {
                    "error" => tracing::error!(id = %id, ts = ts_ms, args = %args_str, "Console error event"),
                    "warning" | "warn" => {
                        tracing::warn!(id = %id, ts = ts_ms, args = %args_str, "Console warn event")
                    }
                    _ => tracing::debug!(id = %id, ts = ts_ms, args = %args_str, "Console event"),
                }
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::ExceptionEvent { id, details })) => {
                let details_val = details.unwrap_or(serde_json::Value::Null);
                tracing::error!(id = %id, details = %details_val, "Runtime exception event");
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::Hello { from })) => {
                tracing::info!(from = ?from, "Extension connected");
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::Pong)) => {}
            Err(e) => tracing::warn!("Invalid incoming JSON: {}", e),
        }
    }

    // Later evals must not pick a dead socket, and evals already sent to it
    // will never be answered.
    clients.lock().await.retain(|c| c.id != client_id);
    let dropped = {
        let mut pending = pending.lock().await;
        let before = pending.len();
        pending.retain(|_, waiter| waiter.client != client_id);
        before - pending.len()
    };
    if dropped > 0 {
        tracing::warn!(%client_id, dropped, "Extension disconnected with evals in flight");
    }
    writer.abort();
}
