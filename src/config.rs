// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Process-wide configuration, read once at `Runtime` construction time. Never a hidden
//! global: callers build a `Config` and hand it to `Runtime::new`, so every test can build
//! an isolated runtime with its own configuration.

const DEFAULT_LOCK_TABLE_SIZE: usize = 1 << 16;

const ENV_READ_ONLY_HINT: &str = "LSA_STM_READ_ONLY_HINT";
const ENV_READ_LOCKED_MODE: &str = "LSA_STM_READ_LOCKED_MODE";
const ENV_LOCK_TABLE_SIZE: &str = "LSA_STM_LOCK_TABLE_SIZE";

/// Process-wide engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Enables the read-only hint optimization (default: off). When disabled, every
    /// transaction maintains a full read set and the hint table is never consulted.
    pub read_only_hint_enabled: bool,

    /// When on, a read that observes an owned slot always aborts with `LockedByOther`,
    /// even if the owner is the reading thread itself (default: off).
    pub read_locked_mode: bool,

    /// Number of slots in the lock table, rounded up to a power of two.
    pub lock_table_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_only_hint_enabled: false,
            read_locked_mode: false,
            lock_table_size: DEFAULT_LOCK_TABLE_SIZE,
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to the documented defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            read_only_hint_enabled: read_bool_env(ENV_READ_ONLY_HINT, defaults.read_only_hint_enabled),
            read_locked_mode: read_bool_env(ENV_READ_LOCKED_MODE, defaults.read_locked_mode),
            lock_table_size: std::env::var(ENV_LOCK_TABLE_SIZE)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.lock_table_size),
        }
    }
}

fn read_bool_env(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}
