//! Core Kernel - Foundational types and utilities for the billing system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed entity identifiers
//! - Academic term types
//! - Caller identity and role checks

pub mod money;
pub mod term;
pub mod identifiers;
pub mod actor;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use term::{Term, TermError};
pub use identifiers::{
    StudentId, ClassId, InvoiceId, PaymentId, CreditBalanceId, TransactionId,
};
pub use actor::{Actor, Role};
pub use ports::{PortError, DomainPort};
