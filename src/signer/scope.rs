//! Signing scopes: one chain account and one nonce counter each.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chain account a transaction is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningScope {
    /// Storage provider operator account.
    Operator,
    /// Account paying fees and deposits.
    Funding,
    /// Account sealing objects.
    Seal,
    /// Account signing approvals.
    Approval,
    /// Account used by garbage collection (bucket discontinuation).
    Gc,
}

impl SigningScope {
    /// Every scope.
    pub const ALL: [Self; 5] = [
        Self::Operator,
        Self::Funding,
        Self::Seal,
        Self::Approval,
        Self::Gc,
    ];

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Funding => "funding",
            Self::Seal => "seal",
            Self::Approval => "approval",
            Self::Gc => "gc",
        }
    }
}

impl fmt::Display for SigningScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
