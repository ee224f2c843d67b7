/*!
format.rs

Output formatting for `rpc-cli`.

  - Results go to stdout as 2-space indented JSON, one block per call.
  - Remote application errors go to the same sink: strings verbatim,
    structured errors as indented JSON.
  - Diagnostics (interactive call failures) go to stderr, colored unless
    NO_COLOR is set or stderr is not a terminal.

Public API Summary:
  - render_json(&Value) -> String
  - render_remote_error(&Value) -> String
  - StyleOptions::detect() -> StyleOptions
  - color(role, text, &StyleOptions) -> String
  - emoji(tag, &StyleOptions) -> &'static str
*/

use serde_json::Value;
use std::io::IsTerminal;

/* -------------------------------------------------------------------------- */
/* JSON Rendering                                                             */
/* -------------------------------------------------------------------------- */

pub fn render_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn render_remote_error(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => render_json(other),
    }
}

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
}

impl StyleOptions {
    /// Style for stderr diagnostics.
    pub fn detect() -> Self {
        let tty = std::io::stderr().is_terminal();
        StyleOptions {
            use_color: tty && std::env::var_os("NO_COLOR").is_none(),
            use_emoji: tty && std::env::var_os("NO_EMOJI").is_none(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Error => "38;5;196", // red
        Role::Dim => "2",          // faint
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "error" => "✖ ",
        _ => "",
    }
}

/// One-line diagnostic for a failed call that did not end the session.
pub fn call_failure(method: &str, err: &anyhow::Error, style: &StyleOptions) -> String {
    format!(
        "{}{} {}",
        emoji("error", style),
        color(Role::Error, format!("{method}:"), style),
        color(Role::Dim, format!("{err:#}"), style)
    )
}
