//! WebSocket server for OCPP connections

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::ports::OcppAdapterFactory;
use crate::application::services::SharedOrchestrator;

use super::shutdown::ShutdownSignal;

/// OCPP 1.6 WebSocket subprotocol
const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// OCPP WebSocket accept loop
pub struct OcppServer {
    address: String,
    adapters: Arc<dyn OcppAdapterFactory>,
    orchestrator: SharedOrchestrator,
    shutdown_signal: Option<ShutdownSignal>,
}

impl OcppServer {
    pub fn new(
        address: impl Into<String>,
        adapters: Arc<dyn OcppAdapterFactory>,
        orchestrator: SharedOrchestrator,
    ) -> Self {
        Self {
            address: address.into(),
            adapters,
            orchestrator,
            shutdown_signal: None,
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    /// Bind and serve until shutdown
    pub async fn run(&self) -> ServerResult<()> {
        let listener = TcpListener::bind(&self.address).await?;
        let addr = listener.local_addr()?;

        info!("🔌 OCPP 1.6 endpoint started on ws://{}", addr);
        info!(
            "   Charge points should connect to: ws://{}/ocpp/{{charge_point_id}}",
            addr
        );
        self.serve(listener).await
    }

    /// Serve an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> ServerResult<()> {
        let shutdown = self.shutdown_signal.clone().unwrap_or_default();
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                _ = shutdown.notified().wait() => {
                    info!("🛑 WebSocket server received shutdown signal");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let adapters = self.adapters.clone();
        let orchestrator = self.orchestrator.clone();
        let shutdown = self.shutdown_signal.clone().unwrap_or_default();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, adapters, orchestrator, shutdown).await {
                warn!(remote = %addr, error = %e, "Connection failed");
            }
        });
    }
}

/// Extract charge point ID from the request path `/ocpp/{charge_point_id}`
fn extract_charge_point_id(path: &str) -> Option<String> {
    let id = path.trim_start_matches('/').strip_prefix("ocpp/")?;
    let id = id.trim_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("No charge point id in path {}", path)));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    adapters: Arc<dyn OcppAdapterFactory>,
    orchestrator: SharedOrchestrator,
    shutdown: ShutdownSignal,
) -> ServerResult<()> {
    debug!(remote = %addr, "New TCP connection");

    let mut charge_point_id: Option<String> = None;

    let mut ws_stream =
        tokio_tungstenite::accept_hdr_async(stream, |req: &Request, mut response: Response| {
            let path = req.uri().path();
            let Some(id) = extract_charge_point_id(path) else {
                warn!(remote = %addr, path, "Rejecting handshake without charge point id");
                return Err(not_found(path));
            };

            let requested = req
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if requested.split(',').map(str::trim).any(|p| p == OCPP_SUBPROTOCOL) {
                response.headers_mut().insert(
                    "Sec-WebSocket-Protocol",
                    HeaderValue::from_static(OCPP_SUBPROTOCOL),
                );
            } else if !requested.is_empty() {
                warn!(charge_point_id = id.as_str(), requested, "Client does not offer ocpp1.6");
            }

            charge_point_id = Some(id);
            Ok(response)
        })
        .await?;

    let Some(charge_point_id) = charge_point_id else {
        return Ok(());
    };
    let cp_id = charge_point_id.as_str();
    // Distinguishes reconnects of the same charge point in the logs
    let connection_id = Uuid::new_v4();
    info!(charge_point_id = cp_id, %connection_id, remote = %addr, "WebSocket connection established");

    orchestrator.on_connect(cp_id);
    let adapter = adapters.create_inbound_adapter(charge_point_id.clone());

    let mut close_code: Option<u16> = None;
    let mut close_reason = String::new();

    loop {
        tokio::select! {
            msg = ws_stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    info!(charge_point_id = cp_id, "<- {}", text);
                    if let Some(reply) = adapter.handle_message(&text).await {
                        info!(charge_point_id = cp_id, "-> {}", reply);
                        if let Err(e) = ws_stream.send(Message::Text(reply)).await {
                            orchestrator.on_error(cp_id, &e.to_string());
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        close_code = Some(u16::from(frame.code));
                        close_reason = frame.reason.to_string();
                    }
                    break;
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(charge_point_id = cp_id, bytes = data.len(), "Binary message ignored");
                }
                // Pings are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    orchestrator.on_error(cp_id, &e.to_string());
                    break;
                }
                None => break,
            },
            _ = shutdown.notified().wait() => {
                close_code = Some(u16::from(CloseCode::Away));
                close_reason = "server shutdown".to_string();
                let frame = CloseFrame {
                    code: CloseCode::Away,
                    reason: close_reason.clone().into(),
                };
                if let Err(e) = ws_stream.close(Some(frame)).await {
                    debug!(charge_point_id = cp_id, error = %e, "Close handshake failed");
                }
                break;
            }
        }
    }

    debug!(charge_point_id = cp_id, %connection_id, "WebSocket connection closed");
    orchestrator.on_disconnect(cp_id, close_code, &close_reason);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::effects::{EffectDispatcher, PublishTarget};
    use crate::application::handlers::V16AdapterFactory;
    use crate::application::services::{AcceptAllAuthorizer, Orchestrator, TransactionSequence};
    use crate::application::session::ChargePointRegistry;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::BrokerPublisher;

    #[test]
    fn charge_point_id_from_path() {
        assert_eq!(extract_charge_point_id("/ocpp/CP-1"), Some("CP-1".into()));
        assert_eq!(extract_charge_point_id("/ocpp/CP-1/"), Some("CP-1".into()));
        assert_eq!(extract_charge_point_id("/ocpp/"), None);
        assert_eq!(extract_charge_point_id("/CP-1"), None);
        assert_eq!(extract_charge_point_id("/ocpp/a/b"), None);
    }

    #[tokio::test]
    async fn serves_calls_until_shutdown() {
        let store = Arc::new(InMemoryStorage::new());
        let effects = EffectDispatcher::spawn(
            store.clone(),
            store.clone(),
            Arc::new(BrokerPublisher::new()),
            PublishTarget::default(),
        );
        let orchestrator = Arc::new(Orchestrator::new(
            ChargePointRegistry::shared(),
            Arc::new(AcceptAllAuthorizer),
            Arc::new(TransactionSequence::default()),
            effects,
            store,
        ));
        let shutdown = ShutdownSignal::new();
        let server = OcppServer::new(
            "127.0.0.1:0",
            Arc::new(V16AdapterFactory::new(orchestrator.clone())),
            orchestrator.clone(),
        )
        .with_shutdown(shutdown.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = tokio::spawn(async move { server.serve(listener).await.is_ok() });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ocpp/CP-1", addr))
            .await
            .unwrap();
        client
            .send(Message::Text(r#"[2,"m1","Heartbeat",{}]"#.to_string()))
            .await
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(reply[0], 3);
        assert_eq!(reply[1], "m1");
        assert!(reply[2]["currentTime"].is_string());
        assert!(orchestrator.registry().contains("CP-1"));

        shutdown.trigger();
        assert!(tokio::time::timeout(Duration::from_secs(2), serving)
            .await
            .unwrap()
            .unwrap());
    }
}
