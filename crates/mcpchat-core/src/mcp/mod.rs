//! MCP (Model Context Protocol) tool connections
//!
//! Uses the official rmcp SDK. Tool providers are reached over a spawned
//! child process (stdio) or Streamable HTTP.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcpchat_core::mcp::{McpConnector, ToolConnector};
//!
//! let connector = McpConnector::new(logger);
//! let connection = connector.connect(&provider_config, Some(token)).await?;
//!
//! let tools = connection.list_tools().await?;
//! let output = connection.call_tool("list_flows", json!({ "limit": 5 })).await?;
//! connection.close().await?;
//! ```

mod client;
mod connector;

pub use client::{to_descriptor, McpClient, McpError, McpResult, ToolOutput};
pub use connector::{McpConnection, McpConnector, ToolConnection, ToolConnector};

// Re-export rmcp types that consumers might need
pub use rmcp::model::{CallToolResult as McpToolResult, Tool as McpTool};
