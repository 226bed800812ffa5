//! Core types for the storefront.
//!
//! This crate provides the identifier types and the error handling alias
//! shared by the backend client, the authentication context, and the
//! operational tooling.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AccountId, AdminRecordId, ParseIdError};
