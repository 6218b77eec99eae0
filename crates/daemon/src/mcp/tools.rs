// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Meta-tool descriptors exposed by every session's tool server.

use serde_json::json;
use swarm_core::ToolDescriptor;

fn tool(name: &str, description: &str, schema: serde_json::Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: schema,
    }
}

/// The fifteen supervisor operations.
pub fn meta_tools() -> Vec<ToolDescriptor> {
    vec![
        tool(
            "discover",
            "Search external catalogs for installable workers",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Free-text search"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50}
                },
                "required": ["query"]
            }),
        ),
        tool(
            "declare_worker",
            "Start a worker and persist it once connected; replaces any same-named worker",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "pattern": "^[A-Za-z0-9_-]+$"},
                    "transport": {"type": "string", "enum": ["local", "stream_sse", "stream_http"]},
                    "command": {"type": "string"},
                    "args": {"type": "array", "items": {"type": "string"}},
                    "env": {"type": "object", "additionalProperties": {"type": "string"}},
                    "url": {"type": "string"},
                    "headers": {"type": "object", "additionalProperties": {"type": "string"}},
                    "description": {"type": "string"},
                    "stateful": {"type": "boolean"}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "remove_worker",
            "Stop a worker and delete its persisted config",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
        tool(
            "list_workers",
            "Live instances plus persisted-but-not-live workers",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            "stop_worker",
            "Stop a live worker; its persisted config survives",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
        tool(
            "start_worker",
            "Spawn a worker from its persisted config",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
        tool(
            "reset_worker",
            "Restart a worker, or spawn it fresh from the persisted config",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
        tool(
            "update_worker",
            "Merge changes into a worker's config; respawns it when running",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "transport": {"type": "string", "enum": ["local", "stream_sse", "stream_http"]},
                    "command": {"type": "string"},
                    "args": {"type": "array", "items": {"type": "string"}},
                    "env": {"type": "object", "additionalProperties": {"type": "string"}},
                    "url": {"type": "string"},
                    "headers": {"type": "object", "additionalProperties": {"type": "string"}},
                    "description": {"type": "string"},
                    "stateful": {"type": "boolean"}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "list_tools",
            "Tool summary per worker, or full schemas for one worker",
            json!({
                "type": "object",
                "properties": {"server": {"type": "string"}}
            }),
        ),
        tool(
            "call_tool",
            "Invoke one tool on a managed worker",
            json!({
                "type": "object",
                "properties": {
                    "server": {"type": "string"},
                    "tool": {"type": "string"},
                    "args": {"type": "object"}
                },
                "required": ["server", "tool"]
            }),
        ),
        tool(
            "list_profiles",
            "Built-in and user profile bundles",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            "activate_profile",
            "Declare and persist every entry of a profile bundle",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
        tool(
            "deactivate_profile",
            "Stop every live entry of a bundle; persisted configs survive",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
        tool(
            "create_profile",
            "Persist a user profile bundle",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "pattern": "^[A-Za-z0-9_-]+$"},
                    "description": {"type": "string"},
                    "entries": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "command": {"type": "string"},
                                "args": {"type": "array", "items": {"type": "string"}},
                                "env": {"type": "object", "additionalProperties": {"type": "string"}},
                                "description": {"type": "string"}
                            },
                            "required": ["name", "command"]
                        }
                    }
                },
                "required": ["name", "entries"]
            }),
        ),
        tool(
            "delete_profile",
            "Delete a user profile bundle; built-ins are protected",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        ),
    ]
}
