/*!
connection.rs - the transport owner.

`ConnectionManager` hides whether calls travel over a persistent socket or
stateless HTTP behind one `invoke(method, params)`:

  - Socket: the client is dialed eagerly (`connect`) or lazily on first
    call. When a call reports a shut-down connection the stale socket is
    dropped, the endpoint re-dialed once and the call retried once with a
    fresh id. Whatever the retry returns is the answer.
  - HTTP: one POST per call, no retry.

Call ids come from a counter on the manager, so they keep increasing across
reconnects and never collide with ids used on a stale socket.
*/

use serde_json::Value;
use tracing::{debug, warn};

use super::http::HttpClient;
use super::socket::SocketClient;
use super::{Endpoint, Reply, RpcError};

#[derive(Debug)]
struct SocketSession {
    host: String,
    port: u16,
    client: Option<SocketClient>,
}

impl SocketSession {
    async fn ensure(&mut self) -> Result<&mut SocketClient, RpcError> {
        if self.client.is_none() {
            self.client = Some(SocketClient::dial(&self.host, self.port).await?);
        }
        // Populated just above.
        self.client.as_mut().ok_or(RpcError::Shutdown)
    }

    async fn redial(&mut self) -> Result<&mut SocketClient, RpcError> {
        // Close the stale socket before opening its replacement.
        self.client = None;
        self.ensure().await
    }
}

#[derive(Debug)]
enum Transport {
    Socket(SocketSession),
    Http(HttpClient),
}

#[derive(Debug)]
pub struct ConnectionManager {
    endpoint: Endpoint,
    transport: Transport,
    last_id: u64,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

impl ConnectionManager {
    /// Build the transport matching the endpoint. No network I/O happens here.
    pub fn new(endpoint: Endpoint, user_agent: Option<String>) -> Result<Self, RpcError> {
        let transport = match &endpoint {
            Endpoint::Socket { host, port, .. } => Transport::Socket(SocketSession {
                host: host.clone(),
                port: *port,
                client: None,
            }),
            Endpoint::Http { url, .. } => {
                Transport::Http(HttpClient::new(url.clone(), user_agent)?)
            }
        };
        Ok(Self {
            endpoint,
            transport,
            last_id: 0,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Open the socket now rather than on the first call. No-op for HTTP.
    pub async fn connect(&mut self) -> Result<(), RpcError> {
        if let Transport::Socket(session) = &mut self.transport {
            session.ensure().await?;
            debug!(endpoint = %self.endpoint, "connected");
        }
        Ok(())
    }

    /// Invoke `method` with `params`, reconnecting at most once on shutdown.
    pub async fn invoke(&mut self, method: &str, params: &Value) -> Result<Reply, RpcError> {
        let id = bump(&mut self.last_id);
        match &mut self.transport {
            Transport::Http(client) => client.call(id, method, params).await,
            Transport::Socket(session) => {
                let first = session.ensure().await?.call(id, method, params).await;
                match first {
                    Err(err) if err.is_shutdown() => {
                        warn!(
                            endpoint = %self.endpoint,
                            method, "connection shut down, reconnecting"
                        );
                        let client = session.redial().await?;
                        let retry_id = bump(&mut self.last_id);
                        client.call(retry_id, method, params).await
                    }
                    other => other,
                }
            }
        }
    }
}
