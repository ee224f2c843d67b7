/*!
Command layer: everything between the parsed command line and the transports.

Layout:
  src/cmd/
    mod.rs      (this file)
    params.rs   (token coercion + params building + JSON stream decoding)
    call.rs     (CallExecutor: one call end to end, Dispatch trait)
    session.rs  (mode selection, one-shot / streamed / interactive drivers)
    format.rs   (JSON rendering + stderr styling)

Conventions:
  - Functions return `anyhow::Result`; transport failures stay downcastable
    to `rpc::RpcError` so the session driver can classify them.
  - Nothing below `main.rs` exits the process.
*/

pub mod call;
pub mod format;
pub mod params;
pub mod session;

pub use call::CallExecutor;
pub use session::Mode;
