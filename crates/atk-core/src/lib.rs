// ATK Core - Foundation types and traits for agent tool adapters
//
// This crate defines the contracts every adapter is built against: the tool
// abstraction exposed to the agent runtime, the two result envelopes, and the
// transport collaborators (HTTP and process execution) adapters delegate to.

pub mod envelope;
pub mod env;
pub mod error;
pub mod process;
pub mod tool;
pub mod transport;

// Re-export core types
pub use envelope::{Envelope, Outcome};
pub use error::{AtkError, AtkResult};
pub use process::{command_line, shell_escape, CommandOutput, CommandRunner};
pub use tool::{
    FailureContract, Tool, ToolConfig, ToolDefinition, ToolExecutor, ToolInput, ToolResult,
    ToolType,
};
pub use transport::{
    BasicAuth, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout applied to tool execution (seconds)
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
