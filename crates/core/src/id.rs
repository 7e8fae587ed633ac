// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier generation helpers.
//!
//! Generated IDs are `{prefix}{nanoid}` with a 4-character type prefix
//! ("svc-", "req-") and a 19-character random suffix. Registry entry
//! identifiers supplied by clients are accepted as-is; generation only
//! happens when a client registers without one.

/// Length of the random suffix in generated IDs.
pub const ID_SUFFIX_LEN: usize = 19;

/// Instance id prefix used by the registry when a client registers
/// without an identifier.
pub const INSTANCE_PREFIX: &str = "svc-";

/// Request id prefix used by dispatch when a client omits one.
pub const REQUEST_PREFIX: &str = "req-";

/// Generate a random ID with the given type prefix.
pub fn generate(prefix: &str) -> String {
    format!("{}{}", prefix, nanoid::nanoid!(ID_SUFFIX_LEN))
}

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
