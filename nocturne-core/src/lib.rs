//! Nocturne Core
//!
//! Core types shared by the Nocturne ledger client and the job listener.
//!
//! This crate contains:
//! - Domain types: job records, task and job statuses, contract error codes
//! - DTOs: request and response bodies exchanged with the node and the relay

pub mod domain;
pub mod dto;
