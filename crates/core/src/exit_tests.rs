// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    normal = { ExitReason::Normal, false },
    shutdown = { ExitReason::Shutdown, false },
    error = { ExitReason::error("boom"), true },
    noproc = { ExitReason::Noproc, true },
    noconnection = { ExitReason::Noconnection, true },
)]
fn abnormality(reason: ExitReason, abnormal: bool) {
    assert_eq!(reason.is_abnormal(), abnormal);
}

#[test]
fn serde_tags_are_stable() {
    let json = serde_json::to_value(ExitReason::Normal).unwrap();
    assert_eq!(json["kind"], "normal");

    let json = serde_json::to_value(ExitReason::error("boom")).unwrap();
    assert_eq!(json["kind"], "error");
    assert_eq!(json["message"], "boom");

    let back: ExitReason = serde_json::from_value(json).unwrap();
    assert_eq!(back, ExitReason::error("boom"));
}

#[test]
fn display_names_match_wire_reasons() {
    assert_eq!(ExitReason::Noconnection.to_string(), "noconnection");
    assert_eq!(ExitReason::error("x").to_string(), "error");
}
