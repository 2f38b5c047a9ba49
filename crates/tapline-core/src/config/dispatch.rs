//! Dispatch engine configuration.

use serde::{Deserialize, Serialize};

/// Environment variable that suppresses the deprecation diagnostic emitted
/// when a hook or injected message omits its schema version. Behavior is
/// unchanged either way; only the warning is silenced.
pub const NO_IMPLIED_VERSION_WARNING_ENV: &str = "TAPLINE_NO_IMPLIED_VERSION_WARNING";

/// Dispatch engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Warn when a registration or injection implies "latest" by omitting
    /// an explicit schema version.
    #[serde(default = "default_true")]
    pub warn_implied_version: bool,
    /// Drop an order group from its opcode bucket once its last hook is
    /// removed. Pure housekeeping; ordering semantics are identical either
    /// way.
    #[serde(default = "default_true")]
    pub prune_empty_order_groups: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            warn_implied_version: true,
            prune_empty_order_groups: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl DispatchConfig {
    /// Build a config from process environment alone.
    pub fn from_env() -> Self {
        Self::default().suppressing(implied_version_warning_suppressed())
    }

    fn suppressing(mut self, suppressed: bool) -> Self {
        if suppressed {
            self.warn_implied_version = false;
        }
        self
    }
}

/// Whether [`NO_IMPLIED_VERSION_WARNING_ENV`] is set to a truthy value.
pub fn implied_version_warning_suppressed() -> bool {
    suppressed_by(std::env::var(NO_IMPLIED_VERSION_WARNING_ENV).ok().as_deref())
}

fn suppressed_by(value: Option<&str>) -> bool {
    value.is_some_and(truthy)
}

fn truthy(value: &str) -> bool {
    !matches!(value, "" | "0" | "false")
}
