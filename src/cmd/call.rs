/*!
`call.rs`

Executes a single remote call end to end:

  tokens ──build_params──┐
                         ├─> ConnectionManager::invoke ─> render ─> output
  decoded JSON value ────┘

Outcomes:
  - Reply::Result -> indented JSON written to the output sink.
  - Reply::Error  -> the error value written to the same sink; the call
                     still counts as completed (Ok).
  - RpcError      -> returned to the session driver.
*/

use anyhow::Result;
use serde_json::Value;
use std::io::Write;
use tracing::{debug, warn};

use crate::cmd::format::{render_json, render_remote_error};
use crate::cmd::params::build_params;
use crate::rpc::{ConnectionManager, Endpoint, Reply};

/// Arguments for one call, as they arrive from the session driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Raw CLI / REPL tokens, still to be turned into a value.
    Tokens(Vec<String>),
    /// A value already decoded from the input stream.
    Decoded(Value),
}

/// Anything that can carry out a call on behalf of the session driver.
pub trait Dispatch {
    async fn dispatch(&mut self, method: &str, params: Params) -> Result<()>;
}

pub struct CallExecutor<W> {
    conn: ConnectionManager,
    out: W,
}

impl<W: Write> CallExecutor<W> {
    pub fn new(conn: ConnectionManager, out: W) -> Self {
        Self { conn, out }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.conn.endpoint()
    }

    /// Establish the socket connection up front (no-op for HTTP).
    pub async fn connect(&mut self) -> Result<()> {
        self.conn.connect().await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Dispatch for CallExecutor<W> {
    async fn dispatch(&mut self, method: &str, params: Params) -> Result<()> {
        let params = match params {
            Params::Tokens(tokens) => build_params(&tokens)?,
            Params::Decoded(value) => value,
        };
        debug!(method, "invoking");

        match self.conn.invoke(method, &params).await? {
            Reply::Result(value) => {
                writeln!(self.out, "{}", render_json(&value))?;
            }
            Reply::Error(err) => {
                warn!(method, "remote returned an application error");
                writeln!(self.out, "{}", render_remote_error(&err))?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
