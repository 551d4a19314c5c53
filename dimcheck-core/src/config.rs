use std::env;

use log::warn;

/// Environment variable turning checking on or off.
pub const ENABLED_VAR: &str = "DIMCHECK_ENABLED";
/// Environment variable turning cross-call matching on for every check.
pub const MATCH_CALLEES_VAR: &str = "DIMCHECK_MATCH_CALLEES";

/// Settings a [`DimScope`](crate::DimScope) starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// When false every checked call runs its function directly.
    pub checking_enabled: bool,
    /// When true every check shares named dimensions with the checks it calls.
    pub match_callees: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checking_enabled: true,
            match_callees: false,
        }
    }
}

impl Config {
    /// Read [`ENABLED_VAR`] and [`MATCH_CALLEES_VAR`], keeping the default for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            checking_enabled: flag(ENABLED_VAR, lookup(ENABLED_VAR), default.checking_enabled),
            match_callees: flag(
                MATCH_CALLEES_VAR,
                lookup(MATCH_CALLEES_VAR),
                default.match_callees,
            ),
        }
    }
}

fn flag(var: &str, value: Option<String>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => true,
        "0" | "false" | "off" | "no" => false,
        other => {
            warn!("ignoring {var}={other:?}, expected a boolean; using {default}");
            default
        }
    }
}
