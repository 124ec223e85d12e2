//! Concrete transports
//!
//! - `ReqwestTransport` - remote HTTP APIs
//! - `UnixSocketTransport` - HTTP over a unix socket (Docker Engine API)
//! - `ShellCommandRunner` - local CLIs through `sh -c`

mod http_client;
mod shell;

#[cfg(all(feature = "docker", unix))]
mod unix_socket;

pub use http_client::{ReqwestTransport, DEFAULT_USER_AGENT};
pub use shell::ShellCommandRunner;

#[cfg(all(feature = "docker", unix))]
pub use unix_socket::UnixSocketTransport;
