/*!
socket.rs - line-delimited JSON-RPC 1.0 client over TCP.

Wire format (one JSON object per line, both directions):
  request:  {"method":"Service.Sum","params":[[1,2,3]],"id":7}
  response: {"result":6,"error":null,"id":7}

The client is single-flight: one request is written, then lines are read
until the matching response arrives. Any peer close or undecodable line
(bad JSON, invalid UTF-8, not an object) marks the client closed; later
calls return `RpcError::Shutdown` so the connection manager can re-dial.
*/

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{Reply, ResponseEnvelope, RpcError};

#[derive(Serialize)]
struct RequestLine<'a> {
    method: &'a str,
    params: [&'a Value; 1],
    id: u64,
}

/// An open socket connection to a JSON-RPC endpoint.
#[derive(Debug)]
pub struct SocketClient {
    stream: BufStream<TcpStream>,
    closed: bool,
}

impl SocketClient {
    /// Dial `host:port`.
    pub async fn dial(host: &str, port: u16) -> Result<Self, RpcError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| RpcError::Connect {
                addr: format!("{host}:{port}"),
                source,
            })?;
        // Requests are tiny and latency bound.
        let _ = stream.set_nodelay(true);
        debug!(%host, port, "socket connected");
        Ok(Self {
            stream: BufStream::new(stream),
            closed: false,
        })
    }

    /// Send one request and wait for its response.
    pub async fn call(&mut self, id: u64, method: &str, params: &Value) -> Result<Reply, RpcError> {
        if self.closed {
            return Err(RpcError::Shutdown);
        }
        let outcome = self.exchange(id, method, params).await;
        if let Err(err) = &outcome
            && !matches!(err, RpcError::Encode(_))
        {
            // The stream position is unknown after a failed exchange.
            self.closed = true;
        }
        outcome
    }

    async fn exchange(&mut self, id: u64, method: &str, params: &Value) -> Result<Reply, RpcError> {
        let mut line = serde_json::to_vec(&RequestLine {
            method,
            params: [params],
            id,
        })?;
        line.push(b'\n');
        trace!(request = %String::from_utf8_lossy(&line).trim_end(), "socket send");

        self.stream
            .write_all(&line)
            .await
            .map_err(RpcError::from_socket_io)?;
        self.stream.flush().await.map_err(RpcError::from_socket_io)?;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = self
                .stream
                .read_until(b'\n', &mut buf)
                .await
                .map_err(RpcError::from_socket_io)?;
            if n == 0 {
                return Err(RpcError::Shutdown);
            }
            if !buf.trim_ascii().is_empty() {
                break;
            }
        }
        trace!(response = %String::from_utf8_lossy(&buf).trim_end(), "socket recv");

        // Invalid UTF-8 is rejected by the JSON decoder as well.
        let envelope = ResponseEnvelope::from_slice(buf.trim_ascii())?;
        match envelope.id.as_ref().and_then(Value::as_u64) {
            Some(got) if got == id => Ok(envelope.into_reply()),
            _ => Err(RpcError::IdMismatch {
                expected: id,
                got: envelope
                    .id
                    .as_ref()
                    .map_or_else(|| "null".to_string(), Value::to_string),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;

    /// Serve one connection: answer every request by echoing `params[0]`
    /// back as the result, except method `Fail` which replies with an error.
    pub(crate) async fn serve_echo(sock: TcpStream) {
        let (read, mut write) = sock.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let req: Value = serde_json::from_str(&line).unwrap();
            let reply = if req["method"] == "Fail" {
                json!({"result": null, "error": "boom", "id": req["id"]})
            } else {
                json!({"result": req["params"][0], "error": null, "id": req["id"]})
            };
            let mut out = serde_json::to_vec(&reply).unwrap();
            out.push(b'\n');
            if write.write_all(&out).await.is_err() {
                break;
            }
        }
    }

    async fn echo_listener() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                tokio::spawn(serve_echo(sock));
            }
        });
        port
    }

    #[tokio::test]
    async fn call_round_trips_params() {
        let port = echo_listener().await;
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let reply = client.call(1, "Service.Echo", &json!({"a": [1, 2]})).await.unwrap();
        assert_eq!(reply, Reply::Result(json!({"a": [1, 2]})));
        let reply = client.call(2, "Service.Echo", &Value::Null).await.unwrap();
        assert_eq!(reply, Reply::Result(Value::Null));
    }

    #[tokio::test]
    async fn remote_error_is_reply_not_failure() {
        let port = echo_listener().await;
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let reply = client.call(1, "Fail", &json!(1)).await.unwrap();
        assert_eq!(reply, Reply::Error(json!("boom")));
        assert!(!client.closed);
    }

    #[tokio::test]
    async fn request_line_wraps_params() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let (read, mut write) = sock.into_split();
            let line = BufReader::new(read).lines().next_line().await.unwrap().unwrap();
            write
                .write_all(b"{\"result\":true,\"error\":null,\"id\":5}\n")
                .await
                .unwrap();
            line
        });
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        client.call(5, "Service.Sum", &json!([1, 2, 3])).await.unwrap();
        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent, json!({"method": "Service.Sum", "params": [[1, 2, 3]], "id": 5}));
    }

    #[tokio::test]
    async fn peer_close_is_shutdown_and_sticks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let err = client.call(1, "Service.Echo", &json!(1)).await.unwrap_err();
        assert!(err.is_shutdown(), "unexpected error: {err}");
        assert!(client.closed);
        let err = client.call(2, "Service.Echo", &json!(1)).await.unwrap_err();
        assert!(err.is_shutdown());
    }

    #[tokio::test]
    async fn mismatched_id_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"{\"result\":1,\"error\":null,\"id\":99}\n")
                .await
                .unwrap();
            // Hold the socket open until the client is done.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let err = client.call(1, "Service.Echo", &json!(1)).await.unwrap_err();
        assert!(matches!(err, RpcError::IdMismatch { expected: 1, .. }));
    }

    /// Accept one connection and answer the first request with `reply`.
    async fn one_reply_listener(reply: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let (read, mut write) = sock.into_split();
            let mut lines = BufReader::new(read).lines();
            if let Ok(Some(_)) = lines.next_line().await {
                write.write_all(reply).await.unwrap();
            }
            // Keep the connection up while the client inspects the reply.
            while let Ok(Some(_)) = lines.next_line().await {}
        });
        port
    }

    #[tokio::test]
    async fn non_json_reply_is_malformed_and_closes() {
        let port = one_reply_listener(b"hello there\n").await;
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let err = client.call(1, "Service.Echo", &json!(1)).await.unwrap_err();
        assert!(matches!(err, RpcError::Malformed(_)), "unexpected error: {err}");
        assert!(!err.ends_session());
        assert!(client.closed);
        assert!(client.call(2, "Service.Echo", &json!(1)).await.unwrap_err().is_shutdown());
    }

    #[tokio::test]
    async fn invalid_utf8_reply_is_malformed() {
        let port = one_reply_listener(b"\xff\xfe garbage\n").await;
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let err = client.call(1, "Service.Echo", &json!(1)).await.unwrap_err();
        assert!(matches!(err, RpcError::Malformed(_)), "unexpected error: {err}");
        assert!(client.closed);
    }

    #[tokio::test]
    async fn array_reply_is_malformed() {
        let port = one_reply_listener(b"[{\"result\":1,\"error\":null,\"id\":1}]\n").await;
        let mut client = SocketClient::dial("127.0.0.1", port).await.unwrap();
        let err = client.call(1, "Service.Echo", &json!(1)).await.unwrap_err();
        assert!(matches!(err, RpcError::Malformed(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn dial_failure_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = SocketClient::dial("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, RpcError::Connect { .. }));
    }
}
