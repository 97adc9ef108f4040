//! TOS Core Library
//!
//! Configuration, credentials, and error types shared by the storage engine
//! and the MCP server.

pub mod config;
pub mod credential;
pub mod error;

// Re-export commonly used types
pub use config::{AddressingStyle, DeployMode, McpTransport, Settings, TosConfig};
pub use credential::Credential;
pub use error::{TosError, TosResult};
