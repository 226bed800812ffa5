//! Shared `Result` alias.
//!
//! Each crate owns its error enum (`BaasError`, `AdminCheckError`,
//! `ProvisionError`) and reports it through a rootcause [`Report`].

use rootcause::Report;

/// A `Result` whose error is a [`Report`] carrying context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
