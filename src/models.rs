use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use crate::token::generate_score_token;

// ============================================================================
// ENUMS
// ============================================================================

/// Where a lead came from (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Inbound,
    Outbound,
}

/// Depth of a score scan (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "scan_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Fast,
    Full,
}

/// Score report lifecycle: pending -> processing -> completed | failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "score_report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, ReportStatus::Completed)
    }
}

/// Expected effect of acting on a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

/// Display band for a score on the results page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    NeedsImprovement,
}

impl ScoreBand {
    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreBand::Excellent
        } else if score >= 60.0 {
            ScoreBand::Good
        } else {
            ScoreBand::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent",
            ScoreBand::Good => "Good",
            ScoreBand::NeedsImprovement => "Needs Improvement",
        }
    }
}

// ============================================================================
// SCORE PAYLOADS
// ============================================================================

/// Overall score plus the four weighted sub-scores
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreComponents {
    pub overall_score: f64,
    pub seo_score: f64,
    pub visibility_score: f64,
    pub local_presence_score: f64,
    pub reputation_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitorBenchmark {
    pub competitor_name: String,
    pub competitor_score: f64,
    pub your_score: f64,
    pub gap: f64,
}

// ============================================================================
// BUSINESS PROFILES
// ============================================================================

/// Contractor lead record, addressed publicly by its score token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessProfile {
    pub id: Uuid,
    pub business_name: String,
    pub website: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub lead_source: LeadSource,
    pub score_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusinessProfile {
    pub id: Uuid,
    pub business_name: String,
    pub website: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub lead_source: LeadSource,
    pub score_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NewBusinessProfile> for BusinessProfile {
    fn from(new: NewBusinessProfile) -> Self {
        Self {
            id: new.id,
            business_name: new.business_name,
            website: new.website,
            contact_name: new.contact_name,
            contact_email: new.contact_email,
            contact_phone: new.contact_phone,
            lead_source: new.lead_source,
            score_token: new.score_token,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }
}

// ============================================================================
// SCORE REPORTS
// ============================================================================

/// One fast or full scan for a profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoreReport {
    pub id: Uuid,
    pub business_profile_id: Uuid,
    pub scan_type: ScanType,
    pub status: ReportStatus,
    pub overall_score: Option<f64>,
    pub seo_score: Option<f64>,
    pub visibility_score: Option<f64>,
    pub local_presence_score: Option<f64>,
    pub reputation_score: Option<f64>,
    pub recommendations: Option<Json<Vec<Recommendation>>>,
    pub competitor_benchmarks: Option<Json<Vec<CompetitorBenchmark>>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScoreReport {
    /// Applies a partial update in place; `None` fields are left untouched.
    pub fn apply(&mut self, update: ScoreReportUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(scores) = update.scores {
            self.overall_score = Some(scores.overall_score);
            self.seo_score = Some(scores.seo_score);
            self.visibility_score = Some(scores.visibility_score);
            self.local_presence_score = Some(scores.local_presence_score);
            self.reputation_score = Some(scores.reputation_score);
        }
        if let Some(recommendations) = update.recommendations {
            self.recommendations = Some(Json(recommendations));
        }
        if let Some(benchmarks) = update.competitor_benchmarks {
            self.competitor_benchmarks = Some(Json(benchmarks));
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Helper struct used when inserting a new report
#[derive(Debug, Clone)]
pub struct NewScoreReport {
    pub id: Uuid,
    pub business_profile_id: Uuid,
    pub scan_type: ScanType,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl NewScoreReport {
    pub fn new(business_profile_id: Uuid, scan_type: ScanType, status: ReportStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_profile_id,
            scan_type,
            status,
            created_at: Utc::now(),
        }
    }
}

impl From<NewScoreReport> for ScoreReport {
    fn from(new: NewScoreReport) -> Self {
        Self {
            id: new.id,
            business_profile_id: new.business_profile_id,
            scan_type: new.scan_type,
            status: new.status,
            overall_score: None,
            seo_score: None,
            visibility_score: None,
            local_presence_score: None,
            reputation_score: None,
            recommendations: None,
            competitor_benchmarks: None,
            error_message: None,
            created_at: new.created_at,
            completed_at: None,
        }
    }
}

/// Partial update of a report; scan type and owner never change
#[derive(Debug, Clone, Default)]
pub struct ScoreReportUpdate {
    pub status: Option<ReportStatus>,
    pub scores: Option<ScoreComponents>,
    pub recommendations: Option<Vec<Recommendation>>,
    pub competitor_benchmarks: Option<Vec<CompetitorBenchmark>>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScoreReportUpdate {
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn completed(
        scores: ScoreComponents,
        recommendations: Vec<Recommendation>,
        competitor_benchmarks: Option<Vec<CompetitorBenchmark>>,
    ) -> Self {
        Self {
            status: Some(ReportStatus::Completed),
            scores: Some(scores),
            recommendations: Some(recommendations),
            competitor_benchmarks,
            error_message: None,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            status: Some(ReportStatus::Failed),
            error_message: Some(message),
            ..Default::default()
        }
    }
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }

    /// Error that still carries a payload, e.g. the current progress.
    pub fn error_with(data: T, message: String) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Lead form submitted from the landing page
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitScoreRequest {
    #[validate(length(min = 1, max = 255, message = "Business name is required"))]
    pub business_name: String,
    #[validate(url(message = "Valid website URL is required"), length(max = 500))]
    pub website: String,
    #[validate(length(max = 255))]
    pub contact_name: Option<String>,
    #[validate(email(message = "Valid email is required"), length(max = 320))]
    pub contact_email: Option<String>,
    #[validate(length(max = 50))]
    pub contact_phone: Option<String>,
}

impl SubmitScoreRequest {
    pub fn into_new_profile(self) -> NewBusinessProfile {
        let now = Utc::now();
        NewBusinessProfile {
            id: Uuid::new_v4(),
            business_name: self.business_name,
            website: self.website,
            contact_name: self.contact_name,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            lead_source: LeadSource::Inbound,
            score_token: Some(generate_score_token()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returned immediately after a submission; scoring continues in the background
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitScoreResponse {
    pub business_profile_id: Uuid,
    pub score_token: Option<String>,
    pub fast_score_id: Uuid,
    pub full_score_id: Uuid,
}

/// Polling payload for the progress page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreStatus {
    pub fast_score_status: ReportStatus,
    pub full_score_status: ReportStatus,
    pub fast_score_completed: bool,
    pub full_score_completed: bool,
}

impl ScoreStatus {
    pub fn from_reports(fast: Option<&ScoreReport>, full: Option<&ScoreReport>) -> Self {
        let fast_score_status = fast.map_or(ReportStatus::Pending, |r| r.status);
        let full_score_status = full.map_or(ReportStatus::Pending, |r| r.status);
        Self {
            fast_score_status,
            full_score_status,
            fast_score_completed: fast_score_status.is_completed(),
            full_score_completed: full_score_status.is_completed(),
        }
    }
}

/// Profile with its latest fast and full reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreLookup {
    pub profile: BusinessProfile,
    pub fast_score: Option<ScoreReport>,
    pub full_score: Option<ScoreReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BandedScore {
    pub value: f64,
    pub band: ScoreBand,
    pub label: String,
}

impl BandedScore {
    pub fn new(value: f64) -> Self {
        let band = ScoreBand::for_score(value);
        Self {
            value,
            band,
            label: band.label().to_string(),
        }
    }
}

/// View model backing the results page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResults {
    pub business_profile_id: Uuid,
    pub business_name: String,
    pub website: String,
    pub scan_type: ScanType,
    pub is_full_score_ready: bool,
    pub overall: BandedScore,
    pub seo: BandedScore,
    pub visibility: BandedScore,
    pub local_presence: BandedScore,
    pub reputation: BandedScore,
    pub recommendations: Vec<Recommendation>,
    pub competitor_benchmarks: Vec<CompetitorBenchmark>,
    pub completed_at: Option<DateTime<Utc>>,
}
