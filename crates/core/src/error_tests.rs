// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    bad_input = { SwarmError::BadInput("x".into()), "bad_input" },
    not_found = { SwarmError::NotFound("x".into()), "not_found" },
    conflict = { SwarmError::Conflict("x".into()), "conflict" },
    spawn_failed = { SwarmError::SpawnFailed("x".into()), "spawn_failed" },
    not_connected = { SwarmError::NotConnected("x".into()), "not_connected" },
    timeout = { SwarmError::Timeout("x".into()), "timeout" },
    worker = { SwarmError::Worker("x".into()), "worker_error" },
    cancelled = { SwarmError::Cancelled("x".into()), "cancelled" },
)]
fn codes_are_stable(err: SwarmError, code: &str) {
    assert_eq!(err.code(), code);
}

#[test]
fn display_carries_detail() {
    let err = SwarmError::SpawnFailed("npm ERR! code E404".into());
    assert!(err.to_string().contains("E404"));
}
