//! Capabilities: the four sensitive verbs the HTTP surface gates
//! endpoints on. The TTL-cached holder lives in `kviewd::capability`
//! (it needs a live cluster client); this module only carries the value
//! type and the naming the rest of the system denies requests by.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub exec: bool,
    pub logs: bool,
    pub port_forward: bool,
    pub secrets: bool,
}

/// Names a single capability, used by `ApiError::CapabilityDenied` to
/// render the `"capability denied: <name>"` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Exec,
    Logs,
    PortForward,
    Secrets,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Exec => "exec",
            Capability::Logs => "logs",
            Capability::PortForward => "portForward",
            Capability::Secrets => "secrets",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Capabilities {
    pub fn allows(&self, cap: Capability) -> bool {
        match cap {
            Capability::Exec => self.exec,
            Capability::Logs => self.logs,
            Capability::PortForward => self.port_forward,
            Capability::Secrets => self.secrets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_is_fail_closed_by_default() {
        let caps = Capabilities::default();
        assert!(!caps.allows(Capability::Exec));
        assert!(!caps.allows(Capability::PortForward));
    }
}
