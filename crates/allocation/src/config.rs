use serde::{Deserialize, Serialize};

/// Upper bound accepted for the combination cap: the search is exponential.
pub const MAX_COMBINATION_CAP: usize = 20;

/// Tunables of the allocation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Largest assignments of a candidate unit considered by the combination
    /// search.
    pub max_combination_assignments: usize,
    /// Run a second pass allowing exchanges with the demand's own assignments.
    pub same_demand_pass: bool,
    /// Deepest demand tree accepted.
    pub max_tree_depth: usize,
    /// Times a pass is re-run after a concurrency conflict.
    pub max_retries: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_combination_assignments: 12,
            same_demand_pass: false,
            max_tree_depth: 32,
            max_retries: 3,
        }
    }
}

impl AllocationConfig {
    /// Read `STOCKFLOW_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AllocationConfig::from_env`], with an explicit source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut config = Self {
            max_combination_assignments: parse_or(
                &lookup,
                "STOCKFLOW_MAX_COMBINATION_ASSIGNMENTS",
                defaults.max_combination_assignments,
            ),
            same_demand_pass: parse_or(&lookup, "STOCKFLOW_SAME_DEMAND_PASS", defaults.same_demand_pass),
            max_tree_depth: parse_or(&lookup, "STOCKFLOW_MAX_TREE_DEPTH", defaults.max_tree_depth),
            max_retries: parse_or(&lookup, "STOCKFLOW_MAX_RETRIES", defaults.max_retries),
        };

        if config.max_combination_assignments == 0
            || config.max_combination_assignments > MAX_COMBINATION_CAP
        {
            let clamped = config.max_combination_assignments.clamp(1, MAX_COMBINATION_CAP);
            tracing::warn!(
                requested = config.max_combination_assignments,
                clamped,
                "combination cap out of range"
            );
            config.max_combination_assignments = clamped;
        }
        if config.max_tree_depth == 0 {
            tracing::warn!("max tree depth cannot be zero, using default");
            config.max_tree_depth = defaults.max_tree_depth;
        }
        config
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid configuration value, using default");
            default
        }),
    }
}
