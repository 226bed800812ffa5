//! Admin allow-list lookup.
//!
//! An account is an admin when the allow-list record set holds a row whose
//! `user_id` is the account's ID. The lookup fails closed: callers treat an
//! error as "not admin".

use crate::error::AdminCheckError;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use storefront_baas::{Query, RecordStore};
use storefront_core::AccountId;
use tracing::{debug, instrument, warn};

/// What to do when the filtered allow-list query fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Report the failure; the account is treated as not admin.
    Disabled,
    /// Scan every `user_id` in the allow-list and test membership locally.
    ///
    /// The primary failure is logged before the scan so its cause stays
    /// visible. A permission error, a network error, and an ambiguous match
    /// all take this path alike.
    #[default]
    FullScan,
}

/// Which query produced an admin decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPath {
    /// The filtered query.
    Filtered,
    /// The full-scan fallback.
    FullScan,
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminStatus {
    /// Whether the account is on the allow-list.
    pub is_admin: bool,
    /// Which query decided.
    pub path: LookupPath,
}

/// Checks accounts against the allow-list.
pub struct AdminLookup<'a> {
    records: &'a dyn RecordStore,
    table: &'a str,
    fallback: FallbackPolicy,
}

impl<'a> AdminLookup<'a> {
    /// Creates a lookup against `table`.
    #[must_use]
    pub fn new(records: &'a dyn RecordStore, table: &'a str, fallback: FallbackPolicy) -> Self {
        Self {
            records,
            table,
            fallback,
        }
    }

    /// Determines whether `account_id` is an admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the filtered query fails (or matches more than one
    /// row) and either the fallback is disabled or it fails too.
    #[instrument(skip(self, account_id), fields(table = %self.table, account_id = %account_id))]
    pub async fn check(
        &self,
        account_id: &AccountId,
    ) -> Result<AdminStatus, Report<AdminCheckError>> {
        let query = Query::new().select("id").eq("user_id", account_id.as_str());

        let primary = match self.records.select(self.table, &query).await {
            Ok(rows) if rows.len() <= 1 => {
                let is_admin = rows.len() == 1;
                debug!(is_admin, "admin check result");
                return Ok(AdminStatus {
                    is_admin,
                    path: LookupPath::Filtered,
                });
            }
            Ok(rows) => AdminCheckError::AmbiguousMatch {
                table: self.table.to_string(),
                count: rows.len(),
            },
            Err(e) => AdminCheckError::QueryFailed {
                table: self.table.to_string(),
                details: e.to_string(),
            },
        };

        match self.fallback {
            FallbackPolicy::Disabled => Err(primary.into()),
            FallbackPolicy::FullScan => {
                warn!(error = %primary, "admin check failed, falling back to full scan");
                self.full_scan(account_id, primary).await
            }
        }
    }

    async fn full_scan(
        &self,
        account_id: &AccountId,
        primary: AdminCheckError,
    ) -> Result<AdminStatus, Report<AdminCheckError>> {
        let query = Query::new().select("user_id");
        let rows = self.records.select(self.table, &query).await.map_err(|e| {
            AdminCheckError::FallbackFailed {
                table: self.table.to_string(),
                primary: primary.to_string(),
                fallback: e.to_string(),
            }
        })?;

        let is_admin = rows.iter().any(|row| {
            row.get("user_id").and_then(serde_json::Value::as_str) == Some(account_id.as_str())
        });
        debug!(is_admin, scanned = rows.len(), "admin check fallback result");

        Ok(AdminStatus {
            is_admin,
            path: LookupPath::FullScan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRecords;

    fn account(id: &str) -> AccountId {
        id.parse().unwrap()
    }

    #[tokio::test]
    async fn listed_account_is_admin() {
        let records = FakeRecords::with_admins(&["acct-a"]);
        let lookup = AdminLookup::new(&records, "admins", FallbackPolicy::Disabled);

        let status = lookup.check(&account("acct-a")).await.expect("lookup");
        assert_eq!(
            status,
            AdminStatus {
                is_admin: true,
                path: LookupPath::Filtered
            }
        );
    }

    #[tokio::test]
    async fn unlisted_account_is_not_admin() {
        let records = FakeRecords::with_admins(&["acct-a"]);
        let lookup = AdminLookup::new(&records, "admins", FallbackPolicy::FullScan);

        let status = lookup.check(&account("acct-b")).await.expect("lookup");
        assert!(!status.is_admin);
        assert_eq!(status.path, LookupPath::Filtered);
        assert_eq!(records.calls(), 1);
    }

    #[tokio::test]
    async fn query_error_without_fallback_fails() {
        let records = FakeRecords::with_admins(&["acct-a"]);
        records.fail_filtered(true);
        let lookup = AdminLookup::new(&records, "admins", FallbackPolicy::Disabled);

        let err = lookup.check(&account("acct-a")).await.err().expect("should fail");
        assert!(err.to_string().contains("admin lookup on 'admins' failed"));
        assert_eq!(records.calls(), 1);
    }

    #[tokio::test]
    async fn query_error_falls_back_to_full_scan() {
        let records = FakeRecords::with_admins(&["acct-a", "acct-c"]);
        records.fail_filtered(true);
        let lookup = AdminLookup::new(&records, "admins", FallbackPolicy::FullScan);

        let status = lookup.check(&account("acct-a")).await.expect("lookup");
        assert_eq!(
            status,
            AdminStatus {
                is_admin: true,
                path: LookupPath::FullScan
            }
        );

        let status = lookup.check(&account("acct-b")).await.expect("lookup");
        assert!(!status.is_admin);
        assert_eq!(status.path, LookupPath::FullScan);
    }

    #[tokio::test]
    async fn failing_fallback_reports_both_causes() {
        let records = FakeRecords::with_admins(&["acct-a"]);
        records.fail_filtered(true);
        records.fail_scan(true);
        let lookup = AdminLookup::new(&records, "admins", FallbackPolicy::FullScan);

        let err = lookup.check(&account("acct-a")).await.err().expect("should fail");
        let message = err.to_string();
        assert!(message.contains("full-scan fallback failed"));
        assert!(message.contains("filtered query unavailable"));
        assert!(message.contains("scan unavailable"));
    }

    #[tokio::test]
    async fn duplicate_rows_take_the_fallback() {
        let records = FakeRecords::with_admins(&["acct-a", "acct-a"]);

        let strict = AdminLookup::new(&records, "admins", FallbackPolicy::Disabled);
        let err = strict.check(&account("acct-a")).await.err().expect("should fail");
        assert!(err.to_string().contains("matched 2 rows"));

        let lenient = AdminLookup::new(&records, "admins", FallbackPolicy::FullScan);
        let status = lenient.check(&account("acct-a")).await.expect("lookup");
        assert!(status.is_admin);
        assert_eq!(status.path, LookupPath::FullScan);
    }
}
