use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use scout_logging::{scout_debug, scout_trace, scout_warn};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::error::CdpError;
use super::protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo};
use super::session::PageSession;
use super::CdpSettings;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;

fn lock_pending(
    pending: &Pending,
) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// HTTP side of the debugging endpoint: version, target listing and
/// target creation.
#[derive(Debug, Clone)]
pub struct CdpDiscovery {
    http: reqwest::Client,
    endpoint: String,
}

impl CdpDiscovery {
    pub fn new(settings: &CdpSettings) -> Result<Self, CdpError> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn version(&self) -> Result<BrowserVersion, CdpError> {
        let url = format!("{}/json/version", self.endpoint);
        scout_debug!("Fetching browser version from {}", url);
        let unavailable = |e: reqwest::Error| {
            CdpError::BrowserNotAvailable(format!("{}: {}", self.endpoint, e))
        };
        self.http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)
    }

    /// Page targets only; service workers and extensions are skipped.
    pub async fn list_pages(&self) -> Result<Vec<PageInfo>, CdpError> {
        let url = format!("{}/json/list", self.endpoint);
        let pages: Vec<PageInfo> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(pages.into_iter().filter(|p| p.page_type == "page").collect())
    }

    pub async fn open_page(&self, url: &str) -> Result<PageInfo, CdpError> {
        // Chrome requires PUT for /json/new.
        let create_url = format!("{}/json/new?{}", self.endpoint, url);
        let page: PageInfo = self
            .http
            .put(&create_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        scout_debug!("Opened target {} for {}", page.id, page.url);
        Ok(page)
    }

    pub async fn activate(&self, target_id: &str) -> Result<(), CdpError> {
        self.target_command("activate", target_id).await
    }

    pub async fn close(&self, target_id: &str) -> Result<(), CdpError> {
        self.target_command("close", target_id).await
    }

    async fn target_command(&self, verb: &str, target_id: &str) -> Result<(), CdpError> {
        let url = format!("{}/json/{}/{}", self.endpoint, verb, target_id);
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CdpError::TargetNotFound(target_id.to_string()));
        }
        response.error_for_status()?;
        Ok(())
    }
}

/// The browser-level WebSocket. Page sessions share it and multiplex their
/// commands with `sessionId`.
pub struct CdpConnection {
    ws_tx: tokio::sync::Mutex<WsSink>,
    pending: Pending,
    request_id: AtomicU64,
    command_timeout: Duration,
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
    pub async fn open(ws_url: &str, command_timeout: Duration) -> Result<Self, CdpError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("{}: {}", ws_url, e)))?;
        let (ws_sink, ws_source) = ws_stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let recv_task = {
            let pending = pending.clone();
            tokio::spawn(async move {
                receive_loop(ws_source, pending).await;
            })
        };

        scout_debug!("CDP connection open to {}", ws_url);
        Ok(Self {
            ws_tx: tokio::sync::Mutex::new(ws_sink),
            pending,
            request_id: AtomicU64::new(1),
            command_timeout,
            recv_task,
        })
    }

    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(str::to_string),
        };
        let text = serde_json::to_string(&request)?;
        scout_trace!("CDP send: {}", text);

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, tx);

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(text.into())).await {
                lock_pending(&self.pending).remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                lock_pending(&self.pending).remove(&id);
                Err(CdpError::Timeout(format!("{} timed out", method)))
            }
        }
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn receive_loop(mut ws_source: WsSource, pending: Pending) {
    while let Some(msg) = ws_source.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                scout_trace!("CDP recv: {}", text.as_str());
                let response = match serde_json::from_str::<CdpResponse>(text.as_str()) {
                    Ok(response) => response,
                    Err(e) => {
                        scout_warn!("Failed to parse CDP message: {}", e);
                        continue;
                    }
                };
                // Events are not consumed; the engine polls page state instead.
                let Some(id) = response.id else { continue };
                let waiter = lock_pending(&pending).remove(&id);
                if let Some(tx) = waiter {
                    let result = match response.error {
                        Some(error) => Err(CdpError::Protocol {
                            code: error.code,
                            message: error.message,
                        }),
                        None => Ok(response.result.unwrap_or(Value::Null)),
                    };
                    let _ = tx.send(result);
                }
            }
            Ok(Message::Close(_)) => {
                scout_debug!("CDP websocket closed");
                break;
            }
            Err(e) => {
                scout_warn!("CDP websocket error: {}", e);
                break;
            }
            _ => {}
        }
    }
    // Dropping the senders wakes every waiter with SessionClosed.
    lock_pending(&pending).clear();
}

/// Connected browser: discovery plus the shared command connection.
pub struct CdpClient {
    discovery: CdpDiscovery,
    connection: Arc<CdpConnection>,
    settings: CdpSettings,
}

impl CdpClient {
    pub async fn connect(settings: CdpSettings) -> Result<Self, CdpError> {
        let discovery = CdpDiscovery::new(&settings)?;
        let version = discovery.version().await?;
        scout_debug!("Connected to browser: {}", version.browser);
        let connection =
            CdpConnection::open(&version.web_socket_debugger_url, settings.command_timeout).await?;
        Ok(Self {
            discovery,
            connection: Arc::new(connection),
            settings,
        })
    }

    pub fn discovery(&self) -> &CdpDiscovery {
        &self.discovery
    }

    /// Attach a flattened session to an existing page target.
    pub async fn attach(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .connection
            .call(
                "Target.attachToTarget",
                Some(json!({ "targetId": target_id, "flatten": true })),
                None,
            )
            .await?;
        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("missing sessionId".to_string()))?
            .to_string();

        let session = PageSession::new(
            target_id.to_string(),
            session_id,
            self.connection.clone(),
            self.settings.page_load_timeout,
        );
        session.enable_domains().await?;
        Ok(session)
    }
}
