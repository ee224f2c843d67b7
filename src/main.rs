use anyhow::{Context, Result};
use clap::Parser;
use std::io;

mod cmd;
mod rpc;
mod utils;

use cmd::{CallExecutor, Mode};
use rpc::{ConnectionManager, Endpoint};

/// rpc-cli - call JSON-RPC services from the shell
///
/// Usage:
///   rpc-cli <address> <method> [args...]   one call
///   rpc-cli <address> <method> < input     one call per JSON value on stdin
///   rpc-cli <address>                      interactive prompt
///
/// Addresses:
///   http://host:port/path, https://...     JSON-RPC over HTTP POST
///   host:port                              line-delimited JSON-RPC over TCP
///
/// Arguments:
///   a single JSON literal is sent as-is:   rpc-cli localhost:3000 Service.Sum '[1,2,3]'
///   otherwise KEY=VALUE pairs, values coerced from JSON when they parse:
///                                          rpc-cli localhost:3000 User.Find name=bob limit=3
///
/// Env:
///   RPC_ADDR         address fallback
///   RPC_USER_AGENT   User-Agent header for HTTP
///   RUST_LOG         overrides -v / -q
#[derive(Parser, Debug)]
#[command(
    name = "rpc-cli",
    version,
    author,
    about = "rpc-cli - call JSON-RPC services over raw sockets or HTTP"
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,

    /// User-Agent header for HTTP endpoints
    #[arg(short = 'A', long, env = "RPC_USER_AGENT", value_name = "UA")]
    user_agent: Option<String>,

    /// Endpoint: http(s) URL or host:port
    #[arg(env = "RPC_ADDR", value_name = "ADDRESS")]
    address: String,

    /// Remote method; omit for the interactive prompt
    #[arg(value_name = "METHOD")]
    method: Option<String>,

    /// Call arguments: one JSON literal or KEY=VALUE pairs
    #[arg(value_name = "ARGS", allow_hyphen_values = true, allow_negative_numbers = true)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let endpoint = match rpc::parse_endpoint(&cli.address) {
        Ok(ep) => ep,
        Err(e) => {
            eprintln!("rpc-cli: invalid address '{}': {e}", cli.address);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli, endpoint) {
        eprintln!("rpc-cli: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, endpoint: Endpoint) -> Result<()> {
    let mode = Mode::select(cli.method, cli.args, cmd::session::stdin_is_stream());
    tracing::debug!(%endpoint, http = endpoint.is_http(), ?mode, "starting");

    let conn = ConnectionManager::new(endpoint, cli.user_agent)?;
    let mut executor = CallExecutor::new(conn, io::stdout());

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(cmd::session::run(mode, &mut executor))
}
