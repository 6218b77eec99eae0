// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn bundle_round_trip() {
    let bundle = ProfileBundle {
        name: "web".into(),
        description: "web tooling".into(),
        entries: vec![ProfileEntry {
            name: "fetch".into(),
            command: "npx".into(),
            args: vec!["-y".into(), "@example/fetch".into()],
            env: IndexMap::new(),
            description: String::new(),
        }],
        builtin: false,
    };
    let json = serde_json::to_string(&bundle).unwrap();
    let back: ProfileBundle = serde_json::from_str(&json).unwrap();
    assert_eq!(back, bundle);
}

#[test]
fn builtin_defaults_false() {
    let bundle: ProfileBundle =
        serde_json::from_str(r#"{"name":"x","entries":[]}"#).unwrap();
    assert!(!bundle.builtin);
}
