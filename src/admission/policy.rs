//! Static identity lists.

use std::collections::HashSet;

/// Blocked and exempt identities, fixed at startup.
///
/// Membership in `blocked` always wins: a blocked identity is rejected even
/// when it also appears in the exemption list.
pub struct IpPolicy {
    blocked: HashSet<String>,
    always_allowed: HashSet<String>,
}

impl IpPolicy {
    pub fn new(blocked: &[String], always_allowed: &[String]) -> Self {
        Self {
            blocked: blocked.iter().cloned().collect(),
            always_allowed: always_allowed.iter().cloned().collect(),
        }
    }

    pub fn is_blocked(&self, identity: &str) -> bool {
        self.blocked.contains(identity)
    }

    pub fn is_always_allowed(&self, identity: &str) -> bool {
        self.always_allowed.contains(identity)
    }
}
