// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    seconds = { "30s", Duration::from_secs(30) },
    millis = { "500ms", Duration::from_millis(500) },
    minutes = { "5m", Duration::from_secs(300) },
    hours = { "1h", Duration::from_secs(3600) },
    bare_number = { "45", Duration::from_secs(45) },
    zero = { "0s", Duration::ZERO },
    padded = { "  10s ", Duration::from_secs(10) },
)]
fn parses_valid_durations(input: &str, want: Duration) {
    assert_eq!(parse(input).unwrap(), want);
}

#[parameterized(
    empty = { "" },
    no_number = { "s" },
    bad_suffix = { "10w" },
    negative = { "-5s" },
    fractional = { "1.5s" },
)]
fn rejects_invalid_durations(input: &str) {
    assert!(parse(input).is_err(), "{input:?} should be rejected");
}

#[test]
fn format_round_trips() {
    for d in [
        Duration::from_secs(30),
        Duration::from_millis(500),
        Duration::from_secs(90),
    ] {
        assert_eq!(parse(&format(d)).unwrap(), d);
    }
}
