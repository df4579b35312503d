//! Service layer for the listener
//!
//! Business logic applied to jobs once the scheduler has detected them.

pub mod processor;

pub use processor::JobProcessor;
