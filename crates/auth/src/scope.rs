//! Actor trust scopes: `GLOBAL ⊃ TENANT ⊃ ORGANIZATION`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Breadth of an actor's authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Platform operator; may act across every tenant.
    Global,
    /// Confined to one tenant, across all of its organizations.
    Tenant,
    /// Confined to one organization inside one tenant.
    Organization,
}

impl Scope {
    fn depth(self) -> u8 {
        match self {
            Scope::Global => 0,
            Scope::Tenant => 1,
            Scope::Organization => 2,
        }
    }

    /// True iff `self` is `required` or one of its ancestors.
    pub fn covers(self, required: Scope) -> bool {
        self.depth() <= required.depth()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "GLOBAL",
            Scope::Tenant => "TENANT",
            Scope::Organization => "ORGANIZATION",
        }
    }
}

/// `GLOBAL` satisfies everything, `TENANT` satisfies `TENANT` and
/// `ORGANIZATION`, `ORGANIZATION` satisfies only itself.
pub fn has_sufficient_scope(actual: Scope, required: Scope) -> bool {
    actual.covers(required)
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown scope '{0}' (expected GLOBAL, TENANT or ORGANIZATION)")]
pub struct ScopeParseError(pub String);

impl core::str::FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GLOBAL" => Ok(Scope::Global),
            "TENANT" => Ok(Scope::Tenant),
            "ORGANIZATION" => Ok(Scope::Organization),
            _ => Err(ScopeParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Scope; 3] = [Scope::Global, Scope::Tenant, Scope::Organization];

    #[test]
    fn hierarchy_is_strict() {
        assert!(has_sufficient_scope(Scope::Global, Scope::Global));
        assert!(has_sufficient_scope(Scope::Global, Scope::Tenant));
        assert!(has_sufficient_scope(Scope::Global, Scope::Organization));

        assert!(!has_sufficient_scope(Scope::Tenant, Scope::Global));
        assert!(has_sufficient_scope(Scope::Tenant, Scope::Tenant));
        assert!(has_sufficient_scope(Scope::Tenant, Scope::Organization));

        assert!(!has_sufficient_scope(Scope::Organization, Scope::Global));
        assert!(!has_sufficient_scope(Scope::Organization, Scope::Tenant));
        assert!(has_sufficient_scope(Scope::Organization, Scope::Organization));
    }

    #[test]
    fn every_scope_covers_itself() {
        for s in ALL {
            assert!(s.covers(s));
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_round_trips_display() {
        for s in ALL {
            assert_eq!(s.to_string().parse::<Scope>().unwrap(), s);
        }
        assert_eq!("tenant".parse::<Scope>().unwrap(), Scope::Tenant);
        assert!("region".parse::<Scope>().is_err());
    }

    #[test]
    fn serde_uses_upper_case_names() {
        assert_eq!(serde_json::to_string(&Scope::Organization).unwrap(), "\"ORGANIZATION\"");
    }
}
