//! Entity identifiers
//!
//! Every entity key is a UUID wrapped in its own type, so an account id
//! handed to a transaction lookup is a compile error rather than a bad
//! query. The store persists ids as dash-free hex; the `Display` form is a
//! short prefixed tag meant for log lines and error messages, not for
//! parsing back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($name:ident, $tag:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The raw UUID value
            pub fn uuid(&self) -> Uuid {
                self.0
            }

            /// Dash-free lowercase hex, the persisted and fingerprinted form
            pub fn simple_hex(&self) -> String {
                self.0.simple().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Tag plus the leading third of the hex is plenty to tell
                // rows apart in a log line
                let hex = self.0.simple().to_string();
                write!(f, "{}{}", $tag, &hex[..8])
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Accept a bare UUID in any format uuid knows, with or
                // without our tag in front
                let s = s.trim();
                let s = s.strip_prefix($tag).unwrap_or(s);
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(AccountId, "acc:");
entity_id!(EnvelopeId, "env:");
entity_id!(TransactionId, "txn:");
entity_id!(SplitLineId, "spl:");
entity_id!(BudgetPeriodId, "per:");
entity_id!(AllocationId, "alo:");
entity_id!(PayeeId, "pay:");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(AccountId::new(), AccountId::new());
        assert!(!EnvelopeId::new().uuid().is_nil());
    }

    #[test]
    fn test_display_is_tagged_and_short() {
        let id = EnvelopeId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("env:"));
        assert_eq!(shown.len(), 12);
        assert!(id.simple_hex().starts_with(&shown[4..]));
    }

    #[test]
    fn test_simple_hex_has_no_dashes() {
        let hex = AccountId::new().simple_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_parse_accepts_bare_and_tagged_uuids() {
        let id = TransactionId::new();

        let bare: TransactionId = id.uuid().to_string().parse().unwrap();
        assert_eq!(bare, id);

        let tagged: TransactionId = format!("txn:{}", id.simple_hex()).parse().unwrap();
        assert_eq!(tagged, id);

        assert!("txn:not-hex".parse::<TransactionId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = PayeeId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.uuid()));
        let back: PayeeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
