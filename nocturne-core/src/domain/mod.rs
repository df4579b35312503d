//! Core domain types
//!
//! These types mirror the records held by the on-chain job registry and are
//! shared between the ledger client (decoding) and the listener (processing).

pub mod job;
pub mod ledger;
