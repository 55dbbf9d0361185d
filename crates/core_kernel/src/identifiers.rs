//! Strongly-typed identifiers for domain entities
//!
//! Every entity id wraps a UUID in its own newtype so an invoice id can
//! never be handed to something expecting a payment id. Fresh ids are
//! time-ordered (UUIDv7), which keeps ledger records roughly
//! chronological in storage. Rendered ids carry a short type prefix
//! ("INV-...", "PAY-...") so they stay recognisable in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident => $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Display prefix for this id type
            pub const PREFIX: &'static str = $prefix;

            /// Mints a fresh, time-ordered identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wraps an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            // Accepts both the prefixed display form and a bare UUID.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .strip_prefix(concat!($prefix, "-"))
                    .unwrap_or(s);
                Uuid::parse_str(raw).map(Self)
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

entity_id!(
    /// A student in the external directory
    StudentId => "STU"
);
entity_id!(
    /// A class in the external directory
    ClassId => "CLS"
);
entity_id!(
    /// A fee invoice
    InvoiceId => "INV"
);
entity_id!(
    /// A payment record
    PaymentId => "PAY"
);
entity_id!(
    /// A student's credit balance
    CreditBalanceId => "CRD"
);
entity_id!(
    /// A ledger transaction in reporting views
    TransactionId => "TXN"
);
