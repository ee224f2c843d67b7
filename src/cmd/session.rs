/*!
`session.rs`

Top-level control flow for a run.

Modes (chosen once from the command line and stdin):
  - OneShot     : `rpc-cli <addr> <method> [args...]` -> one call
  - Streamed    : `... | rpc-cli <addr> <method>`     -> one call per JSON value on stdin
  - Interactive : `rpc-cli <addr>`                    -> REPL, `<method> [args...]` per line

The socket transport is connected before any mode starts; HTTP connects per
call.

Interactive loop rules:
  - Ctrl-C or Ctrl-D at the prompt ends the session cleanly.
  - Blank lines are skipped.
  - Lines are split with shell quoting rules (`echo 'msg=hello world'`).
  - A call that fails without losing the endpoint (bad status, undecodable
    reply, socket error mid-exchange) is reported on stderr and the loop
    goes on. Malformed input and a socket that is still gone after the
    reconnect end the session.
*/

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Read, Write};
use tracing::debug;

use crate::cmd::call::{CallExecutor, Dispatch, Params};
use crate::cmd::format::{StyleOptions, call_failure};
use crate::cmd::params::decode_stream;
use crate::rpc::RpcError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    OneShot { method: String, args: Vec<String> },
    Streamed { method: String },
    Interactive,
}

impl Mode {
    pub fn select(method: Option<String>, args: Vec<String>, stdin_piped: bool) -> Self {
        match method {
            None => Mode::Interactive,
            Some(method) if args.is_empty() && stdin_piped => Mode::Streamed { method },
            Some(method) => Mode::OneShot { method, args },
        }
    }
}

/// Whether stdin carries a stream of call arguments: a pipe, a regular file
/// or a socket. Terminals and other character devices such as `/dev/null`
/// (cron, CI) do not.
#[cfg(unix)]
pub fn stdin_is_stream() -> bool {
    use std::os::fd::AsFd;

    let stdin = io::stdin();
    let Ok(fd) = stdin.as_fd().try_clone_to_owned() else {
        return false;
    };
    std::fs::File::from(fd)
        .metadata()
        .is_ok_and(|meta| is_stream_input(&meta))
}

#[cfg(not(unix))]
pub fn stdin_is_stream() -> bool {
    use std::io::IsTerminal;
    !io::stdin().is_terminal()
}

#[cfg(unix)]
fn is_stream_input(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;

    let kind = meta.file_type();
    kind.is_fifo() || kind.is_file() || kind.is_socket()
}

/* -------------------------------------------------------------------------- */
/* Line Source                                                                */
/* -------------------------------------------------------------------------- */

/// What a single read from the line editor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D / closed input.
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self) -> Result<Line>;
}

/// `rustyline` backed prompt: `<address>> `.
pub struct EditorSource {
    editor: DefaultEditor,
    prompt: String,
}

impl EditorSource {
    pub fn new(address: &str) -> Result<Self> {
        let editor = DefaultEditor::new().context("failed to initialize line editor")?;
        Ok(Self {
            editor,
            prompt: format!("{address}> "),
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self) -> Result<Line> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Line::Text(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(e) => Err(e).context("failed to read line"),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Drivers                                                                    */
/* -------------------------------------------------------------------------- */

/// Run the selected mode against a real executor, reading stdin when streamed.
pub async fn run<W: Write>(mode: Mode, executor: &mut CallExecutor<W>) -> Result<()> {
    executor.connect().await?;
    match mode {
        Mode::OneShot { method, args } => run_one_shot(executor, &method, args).await,
        Mode::Streamed { method } => {
            let calls = run_streamed(executor, &method, io::stdin().lock()).await?;
            debug!(calls, "input stream exhausted");
            Ok(())
        }
        Mode::Interactive => {
            let mut source = EditorSource::new(executor.endpoint().original())?;
            run_interactive(executor, &mut source).await
        }
    }
}

pub async fn run_one_shot<D: Dispatch>(d: &mut D, method: &str, args: Vec<String>) -> Result<()> {
    d.dispatch(method, Params::Tokens(args)).await
}

/// Call `method` once per JSON value in `input`. Returns the number of calls.
pub async fn run_streamed<D: Dispatch, R: Read>(
    d: &mut D,
    method: &str,
    input: R,
) -> Result<usize> {
    let mut calls = 0;
    for value in decode_stream(input) {
        d.dispatch(method, Params::Decoded(value?)).await?;
        calls += 1;
    }
    Ok(calls)
}

pub async fn run_interactive<D: Dispatch, L: LineSource>(d: &mut D, source: &mut L) -> Result<()> {
    let style = StyleOptions::detect();
    loop {
        let line = match source.read_line()? {
            Line::Text(line) => line,
            Line::Interrupted | Line::Eof => return Ok(()),
        };

        let mut tokens =
            shell_words::split(&line).with_context(|| format!("cannot parse line: {line}"))?;
        if tokens.is_empty() {
            continue;
        }
        let method = tokens.remove(0);

        if let Err(err) = d.dispatch(&method, Params::Tokens(tokens)).await {
            if !is_recoverable(&err) {
                return Err(err);
            }
            eprintln!("{}", call_failure(&method, &err, &style));
        }
    }
}

/// Failures that only spoil the current call, not the session.
fn is_recoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RpcError>()
        .is_some_and(|e| !e.ends_session())
}
