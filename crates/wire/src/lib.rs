// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-call protocol shared by the supervisor and its workers.
//!
//! JSON-RPC 2.0 envelope with MCP-shaped methods. Wire format for the
//! stdio transport: newline-delimited JSON, one message per line.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod content;
mod message;

pub use codec::{decode, encode, read_message, write_message, ProtocolError, MAX_MESSAGE_BYTES};
pub use content::{CallToolParams, CallToolResult, ContentBlock, KnownContent, ListToolsResult};
pub use message::{
    initialize_params, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, RpcError,
};

/// Protocol revision spoken on both sides.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// HTTP header carrying the session id (request and response echo).
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Method names.
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_CHANGED: &str = "notifications/tools/list_changed";
}
