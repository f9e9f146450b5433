use std::collections::HashMap;

use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewSubmission, ScoreStore};
use crate::error::{Result, ServiceError};
use crate::models::{BusinessProfile, ScoreReport, ScoreReportUpdate};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, BusinessProfile>,
    reports: HashMap<Uuid, ScoreReport>,
}

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryStore {
    fn create_submission(&self, submission: NewSubmission) -> BoxFuture<'_, Result<BusinessProfile>> {
        Box::pin(async move {
            let NewSubmission { profile, reports } = submission;
            let mut tables = self.tables.write().await;

            // Check everything before touching the tables.
            if let Some(token) = profile.score_token.as_deref() {
                let taken = tables
                    .profiles
                    .values()
                    .any(|existing| existing.score_token.as_deref() == Some(token));
                if taken {
                    return Err(ServiceError::Internal("score token already in use".into()));
                }
            }
            if let Some(orphan) = reports
                .iter()
                .find(|report| report.business_profile_id != profile.id)
            {
                return Err(ServiceError::NotFound(format!(
                    "Business profile {} not found",
                    orphan.business_profile_id
                )));
            }

            let record = BusinessProfile::from(profile);
            tables.profiles.insert(record.id, record.clone());
            for report in reports {
                let report = ScoreReport::from(report);
                tables.reports.insert(report.id, report);
            }
            Ok(record)
        })
    }

    fn get_profile_by_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<BusinessProfile>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .profiles
                .values()
                .find(|profile| profile.score_token.as_deref() == Some(token))
                .cloned())
        })
    }

    fn update_report(
        &self,
        report_id: Uuid,
        update: ScoreReportUpdate,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let report = tables.reports.get_mut(&report_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Score report {report_id} not found"))
            })?;
            report.apply(update);
            Ok(())
        })
    }

    fn list_reports_for_profile(&self, profile_id: Uuid) -> BoxFuture<'_, Result<Vec<ScoreReport>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let mut reports: Vec<ScoreReport> = tables
                .reports
                .values()
                .filter(|report| report.business_profile_id == profile_id)
                .cloned()
                .collect();
            reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(reports)
        })
    }
}
