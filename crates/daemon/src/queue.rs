// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pool admission queues.
//!
//! One FIFO of queued calls per base name plus the list of registered
//! instances for that base. A 1 Hz tick expires stale calls and signals
//! scale-up. The queue holds no reference to the supervisor proper; it
//! drives work through the two callbacks provided at construction.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{Clock, SwarmError};
use swarm_wire::CallToolResult;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs one dispatched call on a named instance.
pub type ExecuteFn = Arc<
    dyn Fn(String, String, Value) -> BoxFuture<'static, Result<CallToolResult, SwarmError>>
        + Send
        + Sync,
>;

/// Asks the supervisor to grow the pool for a base.
pub type ScaleUpFn = Arc<dyn Fn(String) + Send + Sync>;

struct QueuedCall {
    tool: String,
    args: Value,
    enqueued_at_ms: u64,
    reply: oneshot::Sender<Result<CallToolResult, SwarmError>>,
}

struct InstanceSlot {
    internal_name: String,
    busy: bool,
}

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<QueuedCall>>,
    /// Registration order is dispatch order.
    instances: HashMap<String, Vec<InstanceSlot>>,
    scale_pending: HashSet<String>,
}

struct QueueInner<C: Clock> {
    state: Mutex<QueueState>,
    clock: C,
    ttl: Duration,
    scale_up_wait: Duration,
    execute: ExecuteFn,
    on_scale_up: ScaleUpFn,
}

/// Handle to the shared admission queue. Cheap to clone.
pub struct AdmissionQueue<C: Clock> {
    inner: Arc<QueueInner<C>>,
}

impl<C: Clock> Clone for AdmissionQueue<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> AdmissionQueue<C> {
    pub fn new(
        clock: C,
        ttl: Duration,
        scale_up_wait: Duration,
        execute: ExecuteFn,
        on_scale_up: ScaleUpFn,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                clock,
                ttl,
                scale_up_wait,
                execute,
                on_scale_up,
            }),
        }
    }

    /// Enqueue a call for `base` and try to dispatch immediately.
    ///
    /// The returned receiver resolves on completion, TTL expiry, or drain.
    pub fn submit(
        &self,
        base: &str,
        tool: &str,
        args: Value,
    ) -> oneshot::Receiver<Result<CallToolResult, SwarmError>> {
        let (reply, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock();
            state.queues.entry(base.to_string()).or_default().push_back(QueuedCall {
                tool: tool.to_string(),
                args,
                enqueued_at_ms: self.inner.clock.monotonic_ms(),
                reply,
            });
        }
        self.dispatch(base);
        rx
    }

    /// Register a connected instance; triggers a dispatch attempt.
    pub fn register_instance(&self, base: &str, internal_name: &str) {
        {
            let mut state = self.inner.state.lock();
            let slots = state.instances.entry(base.to_string()).or_default();
            if slots.iter().any(|s| s.internal_name == internal_name) {
                return;
            }
            slots.push(InstanceSlot { internal_name: internal_name.to_string(), busy: false });
        }
        self.dispatch(base);
    }

    /// Drop one instance from the dispatch rotation.
    pub fn unregister_instance(&self, base: &str, internal_name: &str) {
        let mut state = self.inner.state.lock();
        if let Some(slots) = state.instances.get_mut(base) {
            slots.retain(|s| s.internal_name != internal_name);
        }
    }

    /// Reject every queued call for `base`, clear its instance list, and
    /// clear any pending scale-up, atomically.
    pub fn drain(&self, base: &str) {
        let calls = {
            let mut state = self.inner.state.lock();
            state.instances.remove(base);
            state.scale_pending.remove(base);
            state.queues.remove(base).unwrap_or_default()
        };
        for call in calls {
            let _ = call
                .reply
                .send(Err(SwarmError::Cancelled("server stopped".into())));
        }
    }

    /// Called by the supervisor when a scale-up resolves either way.
    pub fn clear_scale_pending(&self, base: &str) {
        self.inner.state.lock().scale_pending.remove(base);
    }

    /// Queue depth for a base, for the control surface.
    pub fn depth(&self, base: &str) -> usize {
        self.inner.state.lock().queues.get(base).map_or(0, VecDeque::len)
    }

    /// Whether an instance is currently mid-call.
    pub fn is_busy(&self, base: &str, internal_name: &str) -> bool {
        self.inner
            .state
            .lock()
            .instances
            .get(base)
            .map_or(false, |slots| {
                slots.iter().any(|s| s.internal_name == internal_name && s.busy)
            })
    }

    /// Start the 1 Hz maintenance tick; stops when `shutdown` fires.
    pub fn spawn_tick(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => queue.on_tick(),
                }
            }
        })
    }

    /// One maintenance pass: expire stale calls, then check scale-up.
    pub fn on_tick(&self) {
        let now = self.inner.clock.monotonic_ms();
        let ttl_ms = self.inner.ttl.as_millis() as u64;
        let wait_ms = self.inner.scale_up_wait.as_millis() as u64;

        let mut expired = Vec::new();
        let mut scale_bases = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for (base, queue) in state.queues.iter_mut() {
                while let Some(head) = queue.front() {
                    if now.saturating_sub(head.enqueued_at_ms) >= ttl_ms {
                        if let Some(call) = queue.pop_front() {
                            debug!(base = %base, tool = %call.tool, "expiring queued call");
                            expired.push(call);
                        }
                    } else {
                        break;
                    }
                }
            }

            let candidates: Vec<String> = state
                .queues
                .iter()
                .filter_map(|(base, queue)| {
                    let head = queue.front()?;
                    if now.saturating_sub(head.enqueued_at_ms) < wait_ms {
                        return None;
                    }
                    let all_busy = state
                        .instances
                        .get(base)
                        .map_or(true, |slots| slots.iter().all(|s| s.busy));
                    (all_busy && !state.scale_pending.contains(base)).then(|| base.clone())
                })
                .collect();
            for base in candidates {
                state.scale_pending.insert(base.clone());
                scale_bases.push(base);
            }
        }

        for call in expired {
            let _ = call.reply.send(Err(SwarmError::Timeout(format!(
                "queued call '{}' expired after {}s",
                call.tool,
                self.inner.ttl.as_secs()
            ))));
        }
        for base in scale_bases {
            (self.inner.on_scale_up)(base);
        }
    }

    /// Saturate every idle instance for `base` with queued work.
    pub fn dispatch(&self, base: &str) {
        let mut started = Vec::new();
        {
            let mut state = self.inner.state.lock();
            let QueueState { queues, instances, .. } = &mut *state;
            let (Some(queue), Some(slots)) = (queues.get_mut(base), instances.get_mut(base))
            else {
                return;
            };
            for slot in slots.iter_mut() {
                if slot.busy {
                    continue;
                }
                let Some(call) = queue.pop_front() else { break };
                slot.busy = true;
                started.push((slot.internal_name.clone(), call));
            }
        }

        for (internal_name, call) in started {
            let queue = self.clone();
            let base = base.to_string();
            let execute = Arc::clone(&self.inner.execute);
            tokio::spawn(async move {
                let result = execute(internal_name.clone(), call.tool, call.args).await;
                let _ = call.reply.send(result);
                {
                    let mut state = queue.inner.state.lock();
                    if let Some(slots) = state.instances.get_mut(&base) {
                        if let Some(slot) =
                            slots.iter_mut().find(|s| s.internal_name == internal_name)
                        {
                            slot.busy = false;
                        }
                    }
                }
                queue.dispatch(&base);
            });
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
