/*!
http.rs - stateless JSON-RPC over HTTP POST.

Each call is one request:
  POST <url>
  Content-Type: application/json
  User-Agent: <configured value, optional>

  {"id":1,"method":"Service.Echo","params":[{"a":1}]}

and one reply body `{"result":..,"error":..}`. There is nothing to recover
between calls, so this transport never retries.
*/

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use super::{Reply, ResponseEnvelope, RpcError};

#[derive(Serialize)]
struct RequestBody<'a> {
    id: u64,
    method: &'a str,
    params: [&'a Value; 1],
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    url: Url,
    user_agent: Option<String>,
}

impl HttpClient {
    pub fn new(url: Url, user_agent: Option<String>) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url,
            user_agent,
        })
    }

    pub async fn call(&self, id: u64, method: &str, params: &Value) -> Result<Reply, RpcError> {
        let body = serde_json::to_vec(&RequestBody {
            id,
            method,
            params: [params],
        })?;
        trace!(body = %String::from_utf8_lossy(&body), "http send");

        let mut request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(ua) = &self.user_agent {
            request = request.header(USER_AGENT, ua.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%status, id, method, "http reply");

        if status.as_u16() >= 400 {
            return Err(RpcError::Status(dump_response(response).await));
        }

        let bytes = response.bytes().await?;
        Ok(ResponseEnvelope::from_slice(&bytes)?.into_reply())
    }
}

/// Render status line, headers and body the way a raw HTTP dump reads.
async fn dump_response(response: reqwest::Response) -> String {
    let mut out = format!("{:?} {}\n", response.version(), response.status());
    for (name, value) in response.headers() {
        out.push_str(&format!(
            "{}: {}\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    out.push('\n');
    match response.text().await {
        Ok(text) => out.push_str(&text),
        Err(e) => out.push_str(&format!("<unreadable body: {e}>")),
    }
    out
}
