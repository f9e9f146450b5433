mod memory;
mod postgres;

use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    BusinessProfile, NewBusinessProfile, NewScoreReport, ScanType, ScoreReport, ScoreReportUpdate,
};

pub use memory::MemoryStore;
pub use postgres::Database;

/// A new lead together with the reports created for it.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub profile: NewBusinessProfile,
    pub reports: Vec<NewScoreReport>,
}

/// Persistence for business profiles and their score reports.
///
/// Implemented by the Postgres-backed [`Database`] and by [`MemoryStore`],
/// which is used when no `DATABASE_URL` is configured and in tests.
pub trait ScoreStore: Send + Sync {
    /// Stores the profile and all of its reports, or nothing at all.
    fn create_submission(&self, submission: NewSubmission) -> BoxFuture<'_, Result<BusinessProfile>>;

    fn get_profile_by_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<BusinessProfile>>>;

    fn update_report(
        &self,
        report_id: Uuid,
        update: ScoreReportUpdate,
    ) -> BoxFuture<'_, Result<()>>;

    /// Reports for a profile, newest first.
    fn list_reports_for_profile(&self, profile_id: Uuid) -> BoxFuture<'_, Result<Vec<ScoreReport>>>;
}

/// First (newest) report of the given scan type.
pub fn latest_of(reports: &[ScoreReport], scan_type: ScanType) -> Option<&ScoreReport> {
    reports.iter().find(|report| report.scan_type == scan_type)
}
