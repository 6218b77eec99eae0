// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-scoped meta-tool server.
//!
//! Every session gets one of these bound to the shared supervisor; it
//! answers the tool-call protocol and maps the fifteen supervisor
//! operations onto it. A failed operation returns a plain-text error
//! result with `is_error` set; the protocol request itself succeeds.

mod tools;

pub use tools::meta_tools;

use crate::catalog::{CatalogClient, DEFAULT_LIMIT};
use crate::profiles::ProfileManager;
use crate::supervisor::Supervisor;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;
use swarm_client::ClientFactory;
use swarm_core::{
    config as swarm_config, Clock, SessionId, SwarmError, Transport, WorkerConfig, WorkerState,
};
use swarm_wire::{
    method, CallToolParams, CallToolResult, JsonRpcMessage, JsonRpcResponse, RpcError,
    PROTOCOL_VERSION,
};
use tracing::debug;

/// Tool server bound to the shared supervisor, optionally scoped to one
/// session.
pub struct ToolServer<F: ClientFactory, C: Clock> {
    supervisor: Supervisor<F, C>,
    profiles: Arc<ProfileManager>,
    catalog: Arc<CatalogClient>,
    session: Option<SessionId>,
}

impl<F: ClientFactory, C: Clock> Clone for ToolServer<F, C> {
    fn clone(&self) -> Self {
        Self {
            supervisor: self.supervisor.clone(),
            profiles: Arc::clone(&self.profiles),
            catalog: Arc::clone(&self.catalog),
            session: self.session.clone(),
        }
    }
}

impl<F: ClientFactory, C: Clock> ToolServer<F, C> {
    pub fn new(
        supervisor: Supervisor<F, C>,
        profiles: Arc<ProfileManager>,
        catalog: Arc<CatalogClient>,
    ) -> Self {
        Self { supervisor, profiles, catalog, session: None }
    }

    /// Bind a copy of this server to one session.
    pub fn for_session(&self, session: SessionId) -> Self {
        let mut server = self.clone();
        server.session = Some(session);
        server
    }

    /// Handle one inbound protocol message. Notifications and stray
    /// responses produce no reply.
    pub async fn handle(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        let request = match message {
            JsonRpcMessage::Request(request) => request,
            JsonRpcMessage::Notification(n) => {
                debug!(method = %n.method, "notification");
                return None;
            }
            JsonRpcMessage::Response(_) => return None,
        };

        let response = match request.method.as_str() {
            method::INITIALIZE => JsonRpcResponse::ok(
                request.id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": {
                        "name": "swarm",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            method::PING => JsonRpcResponse::ok(request.id, json!({})),
            method::TOOLS_LIST => {
                JsonRpcResponse::ok(request.id, json!({ "tools": meta_tools() }))
            }
            method::TOOLS_CALL => {
                let params: CallToolParams =
                    match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                        Ok(params) => params,
                        Err(e) => {
                            return Some(JsonRpcResponse::err(
                                request.id,
                                RpcError::invalid_params(e.to_string()),
                            ));
                        }
                    };
                let result = self.dispatch(&params.name, params.arguments).await;
                match serde_json::to_value(&result) {
                    Ok(value) => JsonRpcResponse::ok(request.id, value),
                    Err(e) => JsonRpcResponse::err(
                        request.id,
                        RpcError::new(RpcError::INTERNAL_ERROR, e.to_string()),
                    ),
                }
            }
            other => JsonRpcResponse::err(request.id, RpcError::method_not_found(other)),
        };
        Some(response)
    }

    /// Run one meta-tool; every failure becomes an error-flagged result.
    pub async fn dispatch(&self, tool: &str, args: Value) -> CallToolResult {
        let outcome = match tool {
            "discover" => self.discover(&args).await,
            "declare_worker" => self.declare_worker(&args).await,
            "remove_worker" => self.remove_worker(&args).await,
            "list_workers" => self.list_workers(),
            "stop_worker" => self.stop_worker(&args).await,
            "start_worker" => self.start_worker(&args).await,
            "reset_worker" => self.reset_worker(&args).await,
            "update_worker" => self.update_worker(&args).await,
            "list_tools" => self.list_tools(&args),
            "call_tool" => self.call_tool(&args).await,
            "list_profiles" => self.list_profiles(),
            "activate_profile" => self.activate_profile(&args).await,
            "deactivate_profile" => self.deactivate_profile(&args).await,
            "create_profile" => self.create_profile(&args),
            "delete_profile" => self.delete_profile(&args),
            other => Err(SwarmError::NotFound(format!("tool '{other}'"))),
        };
        match outcome {
            Ok(result) => result,
            Err(e) => CallToolResult::error_text(e.to_string()),
        }
    }

    // -- discovery --

    async fn discover(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let query = required_str(args, "query")?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LIMIT);
        let entries = self.catalog.search(&query, limit).await;
        Ok(CallToolResult::text(pretty(&json!({ "results": entries }))?))
    }

    // -- worker lifecycle --

    async fn declare_worker(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let config = worker_config_from_args(args)?;
        let name = config.name.clone();
        let snapshot = self.supervisor.declare(config.clone()).await?;

        if snapshot.state != WorkerState::Connected {
            let detail = snapshot.last_error.unwrap_or_else(|| "connect failed".into());
            return Err(SwarmError::SpawnFailed(detail));
        }
        // Persisted only now that the spawn reached CONNECTED, so failed
        // declarations are not auto-restored at the next startup.
        self.supervisor
            .store()
            .save_worker(&config)
            .map_err(|e| SwarmError::Internal(e.to_string()))?;
        Ok(CallToolResult::text(format!(
            "worker '{name}' connected ({} tools)",
            snapshot.cached_tools.len()
        )))
    }

    async fn remove_worker(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        let was_live = self.supervisor.get(&name).is_some();
        if was_live {
            self.supervisor.stop(&name).await?;
        }
        let was_stored = self
            .supervisor
            .store()
            .delete_worker(&name)
            .map_err(|e| SwarmError::Internal(e.to_string()))?;
        if !was_live && !was_stored {
            return Err(SwarmError::NotFound(format!("worker '{name}'")));
        }
        Ok(CallToolResult::text(format!("worker '{name}' removed")))
    }

    fn list_workers(&self) -> Result<CallToolResult, SwarmError> {
        let live = self.supervisor.list();
        let mut entries: Vec<Value> = live
            .iter()
            .map(|s| {
                json!({
                    "name": s.internal_name,
                    "status": s.state,
                    "transport": s.transport,
                    "pid": s.process_id,
                    "tools": s.cached_tools.len(),
                    "stateful": s.stateful,
                })
            })
            .collect();

        let persisted = self
            .supervisor
            .store()
            .list_workers()
            .map_err(|e| SwarmError::Internal(e.to_string()))?;
        for config in persisted {
            if live.iter().any(|s| s.base_name == config.name) {
                continue;
            }
            entries.push(json!({
                "name": config.name,
                "status": "not_running",
                "transport": config.transport,
                "stateful": config.stateful,
            }));
        }
        Ok(CallToolResult::text(pretty(&json!({ "workers": entries }))?))
    }

    async fn stop_worker(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        if self.supervisor.get(&name).is_none() {
            return Err(SwarmError::NotRunning(name));
        }
        self.supervisor.stop(&name).await?;
        Ok(CallToolResult::text(format!("worker '{name}' stopped")))
    }

    async fn start_worker(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        if self.supervisor.get(&name).is_some() {
            return Err(SwarmError::AlreadyRunning(name));
        }
        let config = self
            .supervisor
            .store()
            .load_worker(&name)
            .map_err(|e| SwarmError::Internal(e.to_string()))?
            .ok_or_else(|| SwarmError::NotFound(format!("worker '{name}'")))?;
        let snapshot = self.supervisor.declare(config).await?;
        if snapshot.state != WorkerState::Connected {
            let detail = snapshot.last_error.unwrap_or_else(|| "connect failed".into());
            return Err(SwarmError::SpawnFailed(detail));
        }
        Ok(CallToolResult::text(format!("worker '{name}' started")))
    }

    async fn reset_worker(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        let snapshot = self.supervisor.restart(&name).await?;
        if snapshot.state != WorkerState::Connected {
            let detail = snapshot.last_error.unwrap_or_else(|| "connect failed".into());
            return Err(SwarmError::SpawnFailed(detail));
        }
        Ok(CallToolResult::text(format!("worker '{name}' reset")))
    }

    async fn update_worker(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        let mut config = match self
            .supervisor
            .store()
            .load_worker(&name)
            .map_err(|e| SwarmError::Internal(e.to_string()))?
        {
            Some(config) => config,
            None => self
                .supervisor
                .cell(&name)
                .map(|cell| cell.config())
                .ok_or_else(|| SwarmError::NotFound(format!("worker '{name}'")))?,
        };

        merge_worker_args(&mut config, args)?;
        config.validate()?;
        self.supervisor
            .store()
            .save_worker(&config)
            .map_err(|e| SwarmError::Internal(e.to_string()))?;

        let was_live = self.supervisor.get(&name).is_some();
        if was_live {
            self.supervisor.stop(&name).await?;
            let snapshot = self.supervisor.declare(config).await?;
            if snapshot.state != WorkerState::Connected {
                let detail = snapshot.last_error.unwrap_or_else(|| "connect failed".into());
                return Err(SwarmError::SpawnFailed(detail));
            }
        }
        Ok(CallToolResult::text(format!("worker '{name}' updated")))
    }

    // -- tools --

    fn list_tools(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        match args.get("server").and_then(Value::as_str) {
            Some(base) => {
                let snapshot = self
                    .supervisor
                    .get(base)
                    .ok_or_else(|| SwarmError::NotFound(format!("worker '{base}'")))?;
                Ok(CallToolResult::text(pretty(&json!({
                    "server": base,
                    "tools": snapshot.cached_tools,
                }))?))
            }
            None => {
                let lines: Vec<String> = self
                    .supervisor
                    .list()
                    .into_iter()
                    .map(|s| {
                        format!(
                            "{} [{}]: {} tools",
                            s.internal_name,
                            s.state,
                            s.cached_tools.len()
                        )
                    })
                    .collect();
                Ok(CallToolResult::text(if lines.is_empty() {
                    "no workers".to_string()
                } else {
                    lines.join("\n")
                }))
            }
        }
    }

    async fn call_tool(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let server = required_str(args, "server")?;
        let tool = required_str(args, "tool")?;
        let call_args = args.get("args").cloned().unwrap_or_else(|| json!({}));
        self.supervisor
            .call_queued(&server, &tool, call_args, self.session.as_ref())
            .await
    }

    // -- profiles --

    fn list_profiles(&self) -> Result<CallToolResult, SwarmError> {
        let bundles: Vec<Value> = self
            .profiles
            .list()
            .into_iter()
            .map(|b| {
                json!({
                    "name": b.name,
                    "description": b.description,
                    "builtin": b.builtin,
                    "entries": b.entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
                })
            })
            .collect();
        Ok(CallToolResult::text(pretty(&json!({ "profiles": bundles }))?))
    }

    async fn activate_profile(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        let bundle = self.profiles.get(&name)?;

        let mut lines = Vec::new();
        for entry in &bundle.entries {
            // Already-connected entries are left untouched; anything in
            // another state is stopped and declared fresh.
            if let Some(snapshot) = self.supervisor.get(&entry.name) {
                if snapshot.state == WorkerState::Connected {
                    lines.push(format!("{}: already connected", entry.name));
                    continue;
                }
                self.supervisor.stop(&entry.name).await?;
            }

            let mut config = WorkerConfig::local(&entry.name, &entry.command);
            config.args = entry.args.clone();
            config.env = entry.env.clone();
            config.description = entry.description.clone();
            config.stateful = swarm_config::is_stateful_name(&entry.name);

            match self.supervisor.declare(config.clone()).await {
                Ok(snapshot) if snapshot.state == WorkerState::Connected => {
                    self.supervisor
                        .store()
                        .save_worker(&config)
                        .map_err(|e| SwarmError::Internal(e.to_string()))?;
                    lines.push(format!("{}: connected", entry.name));
                }
                Ok(snapshot) => {
                    let detail =
                        snapshot.last_error.unwrap_or_else(|| "connect failed".into());
                    lines.push(format!("{}: failed ({detail})", entry.name));
                }
                Err(e) => lines.push(format!("{}: failed ({e})", entry.name)),
            }
        }
        Ok(CallToolResult::text(format!(
            "profile '{name}' activated\n{}",
            lines.join("\n")
        )))
    }

    async fn deactivate_profile(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        let bundle = self.profiles.get(&name)?;
        let mut stopped = 0;
        for entry in &bundle.entries {
            if self.supervisor.get(&entry.name).is_some() {
                self.supervisor.stop(&entry.name).await?;
                stopped += 1;
            }
        }
        // Persisted configs deliberately survive deactivation.
        Ok(CallToolResult::text(format!(
            "profile '{name}' deactivated ({stopped} workers stopped)"
        )))
    }

    fn create_profile(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        let entries: Vec<swarm_core::ProfileEntry> =
            serde_json::from_value(args.get("entries").cloned().unwrap_or(Value::Null))
                .map_err(|e| SwarmError::BadInput(format!("entries: {e}")))?;
        let bundle = swarm_core::ProfileBundle {
            name: name.clone(),
            description: args
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            entries,
            builtin: false,
        };
        self.profiles.create(bundle)?;
        Ok(CallToolResult::text(format!("profile '{name}' created")))
    }

    fn delete_profile(&self, args: &Value) -> Result<CallToolResult, SwarmError> {
        let name = required_str(args, "name")?;
        self.profiles.delete(&name)?;
        Ok(CallToolResult::text(format!("profile '{name}' deleted")))
    }
}

// -- argument helpers --

fn required_str(args: &Value, key: &str) -> Result<String, SwarmError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| SwarmError::BadInput(format!("missing required field '{key}'")))
}

fn string_map(args: &Value, key: &str) -> Result<Option<IndexMap<String, String>>, SwarmError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| SwarmError::BadInput(format!("{key}: {e}"))),
    }
}

fn string_vec(args: &Value, key: &str) -> Result<Option<Vec<String>>, SwarmError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| SwarmError::BadInput(format!("{key}: {e}"))),
    }
}

fn parse_transport(args: &Value) -> Result<Option<Transport>, SwarmError> {
    match args.get("transport").and_then(Value::as_str) {
        None => Ok(None),
        Some("local") => Ok(Some(Transport::Local)),
        Some("stream_sse") | Some("sse") => Ok(Some(Transport::StreamSse)),
        Some("stream_http") | Some("http") => Ok(Some(Transport::StreamHttp)),
        Some(other) => Err(SwarmError::BadInput(format!("unknown transport '{other}'"))),
    }
}

/// Build a full config from declare_worker arguments.
fn worker_config_from_args(args: &Value) -> Result<WorkerConfig, SwarmError> {
    let name = required_str(args, "name")?;
    let url = args.get("url").and_then(Value::as_str).map(String::from);
    // Transport defaults from the fields provided: a url means
    // streamable HTTP, otherwise a local command.
    let transport = parse_transport(args)?.unwrap_or(if url.is_some() {
        Transport::StreamHttp
    } else {
        Transport::Local
    });

    let stateful = match args.get("stateful").and_then(Value::as_bool) {
        Some(explicit) => explicit,
        None => swarm_config::is_stateful_name(&name),
    };

    let config = WorkerConfig {
        name,
        transport,
        command: args.get("command").and_then(Value::as_str).map(String::from),
        args: string_vec(args, "args")?.unwrap_or_default(),
        env: string_map(args, "env")?.unwrap_or_default(),
        url,
        headers: string_map(args, "headers")?.unwrap_or_default(),
        description: args
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        stateful,
    };
    config.validate()?;
    Ok(config)
}

/// Apply only the provided update_worker fields onto `config`.
fn merge_worker_args(config: &mut WorkerConfig, args: &Value) -> Result<(), SwarmError> {
    if let Some(transport) = parse_transport(args)? {
        config.transport = transport;
    }
    if let Some(command) = args.get("command").and_then(Value::as_str) {
        config.command = Some(command.to_string());
    }
    if let Some(worker_args) = string_vec(args, "args")? {
        config.args = worker_args;
    }
    if let Some(env) = string_map(args, "env")? {
        config.env = env;
    }
    if let Some(url) = args.get("url").and_then(Value::as_str) {
        config.url = Some(url.to_string());
    }
    if let Some(headers) = string_map(args, "headers")? {
        config.headers = headers;
    }
    if let Some(description) = args.get("description").and_then(Value::as_str) {
        config.description = description.to_string();
    }
    if let Some(stateful) = args.get("stateful").and_then(Value::as_bool) {
        config.stateful = stateful;
    }
    Ok(())
}

fn pretty(value: &Value) -> Result<String, SwarmError> {
    serde_json::to_string_pretty(value).map_err(|e| SwarmError::Internal(e.to_string()))
}

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod tests;
