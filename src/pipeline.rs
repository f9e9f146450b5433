//! Lead submission and the background fast -> full scoring chain.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

use crate::database::{latest_of, NewSubmission, ScoreStore};
use crate::error::{Result, ServiceError};
use crate::models::{
    BandedScore, NewScoreReport, ReportStatus, ScanType, ScoreLookup, ScoreReportUpdate,
    ScoreResults, ScoreStatus, SubmitScoreRequest, SubmitScoreResponse,
};
use crate::scoring::ScoreGenerator;

/// A freshly submitted lead; `generation` finishes when both scans are stored.
pub struct Submission {
    pub response: SubmitScoreResponse,
    pub generation: JoinHandle<()>,
}

/// Identifies the two reports a background chain writes to.
#[derive(Debug, Clone)]
struct ScanJob {
    business_profile_id: Uuid,
    business_name: String,
    website: String,
    fast_report_id: Uuid,
    full_report_id: Uuid,
}

#[derive(Clone)]
pub struct ScoreService {
    store: Arc<dyn ScoreStore>,
    generator: ScoreGenerator,
}

impl ScoreService {
    pub fn new(store: Arc<dyn ScoreStore>, generator: ScoreGenerator) -> Self {
        Self { store, generator }
    }

    /// Creates the profile and both reports, then starts scoring without
    /// waiting for it.
    pub async fn submit(&self, request: SubmitScoreRequest) -> Result<Submission> {
        request.validate()?;

        let profile = request.into_new_profile();
        let fast = NewScoreReport::new(profile.id, ScanType::Fast, ReportStatus::Processing);
        let full = NewScoreReport::new(profile.id, ScanType::Full, ReportStatus::Pending);
        let (fast_report_id, full_report_id) = (fast.id, full.id);

        let profile = self
            .store
            .create_submission(NewSubmission {
                profile,
                reports: vec![fast, full],
            })
            .await?;

        log::info!(
            "New inbound lead from {} (website: {}, contact: {}, email: {})",
            profile.business_name,
            profile.website,
            profile.contact_name.as_deref().unwrap_or("N/A"),
            profile.contact_email.as_deref().unwrap_or("N/A"),
        );

        let job = ScanJob {
            business_profile_id: profile.id,
            business_name: profile.business_name.clone(),
            website: profile.website.clone(),
            fast_report_id,
            full_report_id,
        };
        let generation = tokio::spawn(run_scans(
            Arc::clone(&self.store),
            self.generator.clone(),
            job,
        ));

        Ok(Submission {
            response: SubmitScoreResponse {
                business_profile_id: profile.id,
                score_token: profile.score_token,
                fast_score_id: fast_report_id,
                full_score_id: full_report_id,
            },
            generation,
        })
    }

    pub async fn get_by_token(&self, token: &str) -> Result<ScoreLookup> {
        let profile = self
            .store
            .get_profile_by_token(token)
            .await?
            .ok_or_else(ServiceError::score_not_found)?;

        let reports = self.store.list_reports_for_profile(profile.id).await?;
        let fast_score = latest_of(&reports, ScanType::Fast).cloned();
        let full_score = latest_of(&reports, ScanType::Full).cloned();

        Ok(ScoreLookup {
            profile,
            fast_score,
            full_score,
        })
    }

    pub async fn poll_status(&self, token: &str) -> Result<ScoreStatus> {
        let profile = self
            .store
            .get_profile_by_token(token)
            .await?
            .ok_or_else(ServiceError::score_not_found)?;

        let reports = self.store.list_reports_for_profile(profile.id).await?;
        Ok(ScoreStatus::from_reports(
            latest_of(&reports, ScanType::Fast),
            latest_of(&reports, ScanType::Full),
        ))
    }

    pub async fn results(&self, token: &str) -> Result<ScoreResults> {
        let lookup = self.get_by_token(token).await?;
        build_results(lookup)
    }
}

/// Shows the full scan once it is completed, the fast scan until then.
pub fn build_results(lookup: ScoreLookup) -> Result<ScoreResults> {
    let status = ScoreStatus::from_reports(lookup.fast_score.as_ref(), lookup.full_score.as_ref());
    let is_full_score_ready = status.full_score_completed;

    let display = if is_full_score_ready {
        lookup.full_score
    } else {
        lookup.fast_score
    };

    let report = match display {
        Some(report) if report.status.is_completed() => report,
        _ => return Err(ServiceError::StillProcessing(status)),
    };

    let competitor_benchmarks = if is_full_score_ready {
        report
            .competitor_benchmarks
            .as_ref()
            .map(|benchmarks| benchmarks.0.clone())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Ok(ScoreResults {
        business_profile_id: lookup.profile.id,
        business_name: lookup.profile.business_name,
        website: lookup.profile.website,
        scan_type: report.scan_type,
        is_full_score_ready,
        overall: BandedScore::new(report.overall_score.unwrap_or(0.0)),
        seo: BandedScore::new(report.seo_score.unwrap_or(0.0)),
        visibility: BandedScore::new(report.visibility_score.unwrap_or(0.0)),
        local_presence: BandedScore::new(report.local_presence_score.unwrap_or(0.0)),
        reputation: BandedScore::new(report.reputation_score.unwrap_or(0.0)),
        recommendations: report
            .recommendations
            .map(|recommendations| recommendations.0)
            .unwrap_or_default(),
        competitor_benchmarks,
        completed_at: report.completed_at,
    })
}

async fn run_scans(store: Arc<dyn ScoreStore>, generator: ScoreGenerator, job: ScanJob) {
    if let Err(err) = scan_chain(store.as_ref(), &generator, &job).await {
        log::error!(
            "Score generation failed for business profile {}: {err:?}",
            job.business_profile_id
        );
        mark_failed(store.as_ref(), &job, err.to_string()).await;
    }
}

async fn scan_chain(store: &dyn ScoreStore, generator: &ScoreGenerator, job: &ScanJob) -> Result<()> {
    let fast = generator.fast_score(&job.website, &job.business_name).await;
    store
        .update_report(
            job.fast_report_id,
            ScoreReportUpdate::completed(fast.scores, fast.recommendations, None),
        )
        .await?;
    log::info!(
        "Fast score {} completed for business profile {} (overall {:.1})",
        job.fast_report_id,
        job.business_profile_id,
        fast.scores.overall_score
    );

    store
        .update_report(
            job.full_report_id,
            ScoreReportUpdate::status(ReportStatus::Processing),
        )
        .await?;

    let full = generator.full_score(&job.website, &job.business_name).await;
    store
        .update_report(
            job.full_report_id,
            ScoreReportUpdate::completed(
                full.scores,
                full.recommendations,
                Some(full.competitor_benchmarks),
            ),
        )
        .await?;
    log::info!(
        "Full score {} completed for business profile {} (overall {:.1})",
        job.full_report_id,
        job.business_profile_id,
        full.scores.overall_score
    );

    Ok(())
}

/// Both reports of the job end up failed, whatever they had reached.
async fn mark_failed(store: &dyn ScoreStore, job: &ScanJob, message: String) {
    for report_id in [job.fast_report_id, job.full_report_id] {
        if let Err(err) = store
            .update_report(report_id, ScoreReportUpdate::failed(message.clone()))
            .await
        {
            log::error!("Failed to mark score report {report_id} as failed: {err:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanDelays;
    use crate::database::MemoryStore;
    use crate::models::{
        BusinessProfile, CompetitorBenchmark, LeadSource, ScoreComponents, ScoreReport,
    };
    use chrono::Utc;
    use futures_util::future::BoxFuture;
    use sqlx::types::Json;
    use std::time::Duration;

    fn request() -> SubmitScoreRequest {
        SubmitScoreRequest {
            business_name: "Test Contracting".into(),
            website: "https://test.com".into(),
            contact_name: Some("John Doe".into()),
            contact_email: Some("john@test.com".into()),
            contact_phone: Some("555-1234".into()),
        }
    }

    fn instant_service(store: Arc<dyn ScoreStore>) -> ScoreService {
        ScoreService::new(store, ScoreGenerator::new(ScanDelays::none()))
    }

    /// Which `update_report` calls a [`FlakyStore`] rejects.
    #[derive(Clone, Copy)]
    enum Breaks {
        FastResult,
        FullProcessing,
        FullResult,
    }

    /// Delegates to a [`MemoryStore`] but rejects one step of the chain,
    /// and optionally every attempt to record the failure.
    struct FlakyStore {
        inner: MemoryStore,
        breaks: Breaks,
        failure_writes_error: bool,
    }

    impl FlakyStore {
        fn new(breaks: Breaks) -> Self {
            Self {
                inner: MemoryStore::new(),
                breaks,
                failure_writes_error: false,
            }
        }

        fn rejects(&self, update: &ScoreReportUpdate) -> bool {
            if update.status == Some(ReportStatus::Failed) {
                return self.failure_writes_error;
            }
            match self.breaks {
                Breaks::FastResult => {
                    update.scores.is_some() && update.competitor_benchmarks.is_none()
                }
                Breaks::FullProcessing => update.status == Some(ReportStatus::Processing),
                Breaks::FullResult => update.competitor_benchmarks.is_some(),
            }
        }
    }

    impl ScoreStore for FlakyStore {
        fn create_submission(
            &self,
            submission: NewSubmission,
        ) -> BoxFuture<'_, Result<BusinessProfile>> {
            self.inner.create_submission(submission)
        }

        fn get_profile_by_token<'a>(
            &'a self,
            token: &'a str,
        ) -> BoxFuture<'a, Result<Option<BusinessProfile>>> {
            self.inner.get_profile_by_token(token)
        }

        fn update_report(
            &self,
            report_id: Uuid,
            update: ScoreReportUpdate,
        ) -> BoxFuture<'_, Result<()>> {
            if self.rejects(&update) {
                return Box::pin(async { Err(ServiceError::Internal("disk full".into())) });
            }
            self.inner.update_report(report_id, update)
        }

        fn list_reports_for_profile(
            &self,
            profile_id: Uuid,
        ) -> BoxFuture<'_, Result<Vec<ScoreReport>>> {
            self.inner.list_reports_for_profile(profile_id)
        }
    }

    async fn finished_lookup(store: Arc<dyn ScoreStore>) -> ScoreLookup {
        let service = instant_service(store);
        let submission = service.submit(request()).await.unwrap();
        submission.generation.await.unwrap();

        let token = submission.response.score_token.unwrap();
        service.get_by_token(&token).await.unwrap()
    }

    #[tokio::test]
    async fn submit_creates_profile_and_pending_reports() {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        let service = ScoreService::new(
            Arc::clone(&store),
            ScoreGenerator::new(ScanDelays {
                fast: Duration::from_secs(3600)..Duration::from_secs(3600),
                full: Duration::ZERO..Duration::ZERO,
            }),
        );

        let submission = service.submit(request()).await.unwrap();
        let response = submission.response;
        let token = response.score_token.clone().unwrap();

        let lookup = service.get_by_token(&token).await.unwrap();
        assert_eq!(lookup.profile.id, response.business_profile_id);
        assert_eq!(lookup.profile.lead_source, LeadSource::Inbound);
        assert_eq!(lookup.profile.contact_email.as_deref(), Some("john@test.com"));

        let fast = lookup.fast_score.unwrap();
        let full = lookup.full_score.unwrap();
        assert_eq!((fast.id, fast.status), (response.fast_score_id, ReportStatus::Processing));
        assert_eq!((full.id, full.status), (response.full_score_id, ReportStatus::Pending));

        let status = service.poll_status(&token).await.unwrap();
        assert_eq!(status.fast_score_status, ReportStatus::Processing);
        assert!(!status.fast_score_completed);

        submission.generation.abort();
    }

    #[tokio::test]
    async fn chain_completes_fast_then_full() {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        let service = instant_service(Arc::clone(&store));

        let submission = service.submit(request()).await.unwrap();
        submission.generation.await.unwrap();

        let token = submission.response.score_token.unwrap();
        let status = service.poll_status(&token).await.unwrap();
        assert!(status.fast_score_completed);
        assert!(status.full_score_completed);

        let lookup = service.get_by_token(&token).await.unwrap();
        let fast = lookup.fast_score.unwrap();
        let full = lookup.full_score.unwrap();
        assert!(fast.overall_score.is_some());
        assert!(fast.completed_at.is_some());
        assert!(fast.competitor_benchmarks.is_none());
        assert_eq!(full.competitor_benchmarks.map(|b| b.0.len()), Some(3));
        assert!(full.completed_at.is_some());
        assert!(full.error_message.is_none());
    }

    #[tokio::test]
    async fn any_failed_step_fails_both_reports() {
        for breaks in [Breaks::FastResult, Breaks::FullProcessing, Breaks::FullResult] {
            let lookup = finished_lookup(Arc::new(FlakyStore::new(breaks))).await;

            for report in [lookup.fast_score.unwrap(), lookup.full_score.unwrap()] {
                assert_eq!(report.status, ReportStatus::Failed);
                assert_eq!(report.error_message.as_deref(), Some("Internal error: disk full"));
            }
        }
    }

    #[tokio::test]
    async fn failed_full_scan_overrides_completed_fast_score() {
        let store: Arc<dyn ScoreStore> = Arc::new(FlakyStore::new(Breaks::FullResult));
        let service = instant_service(store);

        let submission = service.submit(request()).await.unwrap();
        submission.generation.await.unwrap();

        let token = submission.response.score_token.unwrap();
        let status = service.poll_status(&token).await.unwrap();
        assert_eq!(status.fast_score_status, ReportStatus::Failed);
        assert_eq!(status.full_score_status, ReportStatus::Failed);
        assert!(!status.fast_score_completed);

        match service.results(&token).await {
            Err(ServiceError::StillProcessing(status)) => {
                assert_eq!(status.fast_score_status, ReportStatus::Failed);
            }
            other => panic!("expected no displayable score, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecordable_failure_still_ends_the_task() {
        let store = FlakyStore {
            failure_writes_error: true,
            ..FlakyStore::new(Breaks::FastResult)
        };
        let lookup = finished_lookup(Arc::new(store)).await;

        // Nothing could be written, so the reports keep their initial state.
        assert_eq!(lookup.fast_score.unwrap().status, ReportStatus::Processing);
        assert_eq!(lookup.full_score.unwrap().status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected_before_storage() {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        let service = instant_service(store);

        let result = service
            .submit(SubmitScoreRequest {
                website: "invalid-url".into(),
                ..request()
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let service = instant_service(Arc::new(MemoryStore::new()));

        for result in [
            service.poll_status("invalid-token").await.map(|_| ()),
            service.get_by_token("invalid-token").await.map(|_| ()),
            service.results("invalid-token").await.map(|_| ()),
        ] {
            match result {
                Err(ServiceError::NotFound(message)) => assert_eq!(message, "Score not found"),
                other => panic!("expected not found, got {other:?}"),
            }
        }
    }

    fn lookup_with(fast: Option<ScoreReport>, full: Option<ScoreReport>) -> ScoreLookup {
        let now = Utc::now();
        ScoreLookup {
            profile: BusinessProfile {
                id: Uuid::new_v4(),
                business_name: "Test Contracting".into(),
                website: "https://test.com".into(),
                contact_name: None,
                contact_email: None,
                contact_phone: None,
                lead_source: LeadSource::Inbound,
                score_token: Some("test-token-123".into()),
                created_at: now,
                updated_at: now,
            },
            fast_score: fast,
            full_score: full,
        }
    }

    fn completed(scan_type: ScanType, overall: f64) -> ScoreReport {
        let mut report: ScoreReport =
            NewScoreReport::new(Uuid::new_v4(), scan_type, ReportStatus::Processing).into();
        report.apply(ScoreReportUpdate::completed(
            ScoreComponents {
                overall_score: overall,
                seo_score: 68.2,
                visibility_score: 75.3,
                local_presence_score: 78.1,
                reputation_score: 71.4,
            },
            Vec::new(),
            None,
        ));
        if scan_type == ScanType::Full {
            report.competitor_benchmarks = Some(Json(vec![CompetitorBenchmark {
                competitor_name: "Top Local Competitor".into(),
                competitor_score: 85.0,
                your_score: overall,
                gap: 85.0 - overall,
            }]));
        }
        report
    }

    fn in_state(scan_type: ScanType, status: ReportStatus) -> ScoreReport {
        NewScoreReport::new(Uuid::new_v4(), scan_type, status).into()
    }

    #[test]
    fn results_wait_for_the_fast_score() {
        let lookup = lookup_with(
            Some(in_state(ScanType::Fast, ReportStatus::Processing)),
            Some(in_state(ScanType::Full, ReportStatus::Pending)),
        );
        match build_results(lookup) {
            Err(ServiceError::StillProcessing(status)) => {
                assert_eq!(status.fast_score_status, ReportStatus::Processing);
            }
            other => panic!("expected still processing, got {other:?}"),
        }
    }

    #[test]
    fn results_show_fast_score_without_benchmarks() {
        let lookup = lookup_with(
            Some(completed(ScanType::Fast, 73.5)),
            Some(in_state(ScanType::Full, ReportStatus::Processing)),
        );
        let results = build_results(lookup).unwrap();
        assert_eq!(results.scan_type, ScanType::Fast);
        assert!(!results.is_full_score_ready);
        assert_eq!(results.overall.value, 73.5);
        assert_eq!(results.overall.label, "Good");
        assert!(results.competitor_benchmarks.is_empty());
    }

    #[test]
    fn results_prefer_completed_full_score() {
        let lookup = lookup_with(
            Some(completed(ScanType::Fast, 73.5)),
            Some(completed(ScanType::Full, 81.0)),
        );
        let results = build_results(lookup).unwrap();
        assert_eq!(results.scan_type, ScanType::Full);
        assert!(results.is_full_score_ready);
        assert_eq!(results.overall.label, "Excellent");
        assert_eq!(results.competitor_benchmarks.len(), 1);
    }
}
