// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn parse_primary() {
    assert_eq!(
        InstanceName::parse("fetch"),
        InstanceName::Primary { base: "fetch".into() }
    );
}

#[test]
fn parse_scaled() {
    assert_eq!(
        InstanceName::parse("fetch#3"),
        InstanceName::Scaled { base: "fetch".into(), index: 3 }
    );
}

#[test]
fn parse_session() {
    assert_eq!(
        InstanceName::parse("browser@a1b2c3d4"),
        InstanceName::Session { base: "browser".into(), prefix: "a1b2c3d4".into() }
    );
}

#[test]
fn scaled_with_bad_index_falls_back_to_session_or_primary() {
    // A '#' with a non-numeric suffix is not a scaled name.
    assert_eq!(
        InstanceName::parse("fetch#abc"),
        InstanceName::Primary { base: "fetch#abc".into() }
    );
}

#[parameterized(
    primary = { "fetch", false },
    scaled = { "fetch#1", true },
    session = { "browser@a1b2c3d4", true },
)]
fn derived_detection(name: &str, derived: bool) {
    assert_eq!(is_derived(name), derived);
}

#[parameterized(
    primary = { "fetch", "fetch" },
    scaled = { "fetch#2", "fetch" },
    session = { "browser@a1b2c3d4", "browser" },
)]
fn base_extraction(name: &str, base: &str) {
    assert_eq!(base_of(name), base);
}

#[test]
fn format_round_trips() {
    assert_eq!(
        InstanceName::parse(&scaled_name("w", 7)),
        InstanceName::Scaled { base: "w".into(), index: 7 }
    );
    assert_eq!(
        InstanceName::parse(&session_name("w", "deadbeef")),
        InstanceName::Session { base: "w".into(), prefix: "deadbeef".into() }
    );
}
