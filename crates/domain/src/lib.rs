//! # apiq Domain
//!
//! Plain data shared between the dispatcher and its adapters.
//!
//! This crate contains:
//! - Call descriptors handed from generated endpoint glue to the core
//! - Transport failures and their retry classification
//! - Client configuration (`ClientConfig`) and its sub-sections
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - Depends only on `apiq-common` for the resilience configuration types
//! - No I/O, no async runtime
//! - Pure data structures

pub mod call;
pub mod config;
pub mod errors;
pub mod failure;

// Re-export commonly used items
pub use call::{CallDescriptor, HttpMethod};
pub use config::ClientConfig;
pub use errors::*;
pub use failure::{CallOutcome, Failure, FailureKind};
