use {std::time::Duration, thiserror::Error};

pub const STEP_BUDGET_VAR: &str = "KV_CHECKER_STEP_BUDGET";
pub const TIME_BUDGET_VAR: &str = "KV_CHECKER_TIME_BUDGET_MS";
pub const MEMOIZE_VAR: &str = "KV_CHECKER_MEMOIZE";

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var}={value:?} is not {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Limits and switches for a [`Checker`](crate::Checker).
///
/// The default configuration searches without bounds and memoizes explored subproblems, so it
/// always reaches a definite verdict (eventually).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckerConfig {
    /// Maximum number of candidate operations to apply before giving up.
    pub step_budget: Option<u64>,
    /// Maximum wall-clock time to search before giving up.
    pub time_budget: Option<Duration>,
    /// Skip subproblems (same events linearized, same store contents) already explored.
    pub memoize: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            step_budget: None,
            time_budget: None,
            memoize: true,
        }
    }
}

impl CheckerConfig {
    pub fn step_budget(mut self, steps: u64) -> Self {
        self.step_budget = Some(steps);
        self
    }

    pub fn time_budget(mut self, duration: Duration) -> Self {
        self.time_budget = Some(duration);
        self
    }

    pub fn memoize(mut self, enabled: bool) -> Self {
        self.memoize = enabled;
        self
    }

    /// Reads `KV_CHECKER_STEP_BUDGET`, `KV_CHECKER_TIME_BUDGET_MS` and `KV_CHECKER_MEMOIZE`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = CheckerConfig::default();
        if let Some(value) = lookup(STEP_BUDGET_VAR) {
            config.step_budget = Some(parse_u64(STEP_BUDGET_VAR, value)?);
        }
        if let Some(value) = lookup(TIME_BUDGET_VAR) {
            config.time_budget = Some(Duration::from_millis(parse_u64(TIME_BUDGET_VAR, value)?));
        }
        if let Some(value) = lookup(MEMOIZE_VAR) {
            config.memoize = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: MEMOIZE_VAR,
                        value,
                        expected: "a boolean",
                    })
                }
            };
        }
        Ok(config)
    }
}

fn parse_u64(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value,
        expected: "a non-negative integer",
    })
}
