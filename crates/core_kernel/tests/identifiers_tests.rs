//! Integration tests for typed identifiers

use core_kernel::{CreditBalanceId, InvoiceId, PaymentId, StudentId};
use uuid::Uuid;

#[test]
fn test_prefixes_are_distinct() {
    assert_eq!(StudentId::PREFIX, "STU");
    assert_eq!(InvoiceId::PREFIX, "INV");
    assert_eq!(PaymentId::PREFIX, "PAY");
    assert_eq!(CreditBalanceId::PREFIX, "CRD");
}

#[test]
fn test_fresh_ids_are_version_7() {
    let id = InvoiceId::new();
    assert_eq!(id.as_uuid().get_version_num(), 7);
}

#[test]
fn test_serde_is_transparent() {
    let id = PaymentId::new();
    let json = serde_json::to_string(&id).unwrap();
    // Serialized as a bare UUID string, not a struct
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));

    let back: PaymentId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_display_and_parse_round_trip() {
    let id = StudentId::new();
    let parsed: StudentId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);

    let raw = Uuid::new_v4();
    let from_raw: StudentId = raw.to_string().parse().unwrap();
    assert_eq!(from_raw.as_uuid(), &raw);
}
