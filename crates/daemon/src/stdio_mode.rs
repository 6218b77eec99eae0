// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-client stdio mode.
//!
//! The meta-tool server attaches straight to the parent process's
//! standard streams. No HTTP surface, no session index: calls reach
//! `call_queued` without a session id, so the stateful-isolation branch
//! is never taken.

use crate::mcp::ToolServer;
use swarm_client::ClientFactory;
use swarm_core::Clock;
use swarm_wire::{read_message, write_message, ProtocolError};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Serve the tool protocol over stdin/stdout until EOF or shutdown.
pub async fn run<F: ClientFactory, C: Clock>(
    tools: ToolServer<F, C>,
    shutdown: CancellationToken,
) -> Result<(), ProtocolError> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = read_message(&mut stdin) => match read? {
                Some(message) => message,
                None => {
                    debug!("stdin closed, leaving stdio mode");
                    break;
                }
            },
        };
        if let Some(response) = tools.handle(message).await {
            write_message(&mut stdout, &response.into()).await?;
        }
    }
    Ok(())
}
