//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Options fixed when a [`Registry`](crate::Registry) is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reject registrations that would close a dependency cycle.
    ///
    /// Turning this off also skips all edge bookkeeping.
    pub check_circular: bool,
}

impl RegistryConfig {
    /// Set `check_circular`.
    pub fn with_check_circular(mut self, check_circular: bool) -> Self {
        self.check_circular = check_circular;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            check_circular: true,
        }
    }
}
