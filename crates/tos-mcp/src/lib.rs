//! TOS MCP Server
//!
//! Model Context Protocol server that exposes Volcengine TOS buckets,
//! objects, and video processing as tools for AI assistants.

pub mod auth;
pub mod server;
pub mod tools;

pub use auth::CredentialResolver;
pub use server::TosService;
