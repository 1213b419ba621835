//! Typed identifiers for brokers, invoices, payments and loads
//!
//! Ids are UUIDs on the wire and in storage. `Display` adds a short prefix
//! (`BRK-`, `INV-`, `PAY-`, `LD-`) for logs and messages; `FromStr` takes
//! either form so ids copied from a log line still resolve.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Text that is not an id of the expected kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a valid {kind} id")]
pub struct IdParseError {
    pub kind: &'static str,
    pub input: String,
}

macro_rules! billing_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Random (v4)
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Time-ordered (v7), used for stored documents
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.trim();
                let bare = raw.strip_prefix(concat!($prefix, "-")).unwrap_or(raw);
                Uuid::parse_str(bare).map(Self).map_err(|_| IdParseError {
                    kind: $kind,
                    input: s.to_string(),
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

billing_id!(
    /// A client company being invoiced
    BrokerId, "BRK", "broker"
);
billing_id!(InvoiceId, "INV", "invoice");
billing_id!(PaymentId, "PAY", "payment");
billing_id!(
    /// A single shipment
    LoadId, "LD", "load"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_forms() {
        let original = InvoiceId::new_v7();
        assert_eq!(original.to_string().parse::<InvoiceId>(), Ok(original));
        assert_eq!(original.as_uuid().to_string().parse::<InvoiceId>(), Ok(original));
    }

    #[test]
    fn test_parse_error_names_the_kind() {
        let error = "PAY-not-a-uuid".parse::<PaymentId>().unwrap_err();
        assert_eq!(error.kind, "payment");
        assert_eq!(error.to_string(), "'PAY-not-a-uuid' is not a valid payment id");
    }

    #[test]
    fn test_foreign_prefix_is_rejected() {
        let load = LoadId::new();
        assert!(load.to_string().parse::<BrokerId>().is_err());
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let id = BrokerId::new();
        assert_eq!(format!("  {id}\n").parse::<BrokerId>(), Ok(id));
    }
}
