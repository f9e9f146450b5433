use std::{borrow::Cow, time::Duration};

use futures_util::future::BoxFuture;
use sqlx::{
    postgres::{PgConnectOptions, PgConnection, PgPoolOptions},
    types::Json,
    Connection, Executor, PgPool, Postgres, Transaction,
};
use uuid::Uuid;

use super::{NewSubmission, ScoreStore};
use crate::error::{Result, ServiceError};
use crate::models::{
    BusinessProfile, NewBusinessProfile, NewScoreReport, ScoreReport, ScoreReportUpdate,
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options: PgConnectOptions = database_url.parse()?;

        let pool = match pool_options().connect_with(options.clone()).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database(&options).await?;

                pool_options().connect_with(options).await?
            }
            Err(err) => return Err(err.into()),
        };

        // Run embedded migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        log::info!("Database connection established");
        Ok(Self { pool })
    }

    /// Inserts the profile and its reports in one transaction.
    pub async fn create_submission(&self, submission: NewSubmission) -> Result<BusinessProfile> {
        let NewSubmission { profile, reports } = submission;

        let mut tx = self.pool.begin().await?;
        let profile = Self::insert_profile_with_tx(&mut tx, profile).await?;
        for report in reports {
            Self::insert_report_with_tx(&mut tx, report).await?;
        }
        tx.commit().await?;

        Ok(profile)
    }

    async fn insert_profile_with_tx(
        tx: &mut Transaction<'_, Postgres>,
        profile: NewBusinessProfile,
    ) -> std::result::Result<BusinessProfile, sqlx::Error> {
        let NewBusinessProfile {
            id,
            business_name,
            website,
            contact_name,
            contact_email,
            contact_phone,
            lead_source,
            score_token,
            created_at,
            updated_at,
        } = profile;

        let record = sqlx::query_as::<_, BusinessProfile>(
            r#"
            INSERT INTO business_profiles (
                id,
                business_name,
                website,
                contact_name,
                contact_email,
                contact_phone,
                lead_source,
                score_token,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING
                id,
                business_name,
                website,
                contact_name,
                contact_email,
                contact_phone,
                lead_source,
                score_token,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(business_name)
        .bind(website)
        .bind(contact_name)
        .bind(contact_email)
        .bind(contact_phone)
        .bind(lead_source)
        .bind(score_token)
        .bind(created_at)
        .bind(updated_at)
        .fetch_one(tx.as_mut())
        .await?;

        Ok(record)
    }

    pub async fn get_profile_by_token(&self, token: &str) -> Result<Option<BusinessProfile>> {
        let record = sqlx::query_as::<_, BusinessProfile>(
            r#"
            SELECT
                id,
                business_name,
                website,
                contact_name,
                contact_email,
                contact_phone,
                lead_source,
                score_token,
                created_at,
                updated_at
            FROM business_profiles
            WHERE score_token = $1
            LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_report_with_tx(
        tx: &mut Transaction<'_, Postgres>,
        report: NewScoreReport,
    ) -> std::result::Result<ScoreReport, sqlx::Error> {
        let record = sqlx::query_as::<_, ScoreReport>(
            r#"
            INSERT INTO score_reports (id, business_profile_id, scan_type, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING
                id,
                business_profile_id,
                scan_type,
                status,
                overall_score,
                seo_score,
                visibility_score,
                local_presence_score,
                reputation_score,
                recommendations,
                competitor_benchmarks,
                error_message,
                created_at,
                completed_at
            "#,
        )
        .bind(report.id)
        .bind(report.business_profile_id)
        .bind(report.scan_type)
        .bind(report.status)
        .bind(report.created_at)
        .fetch_one(tx.as_mut())
        .await?;

        Ok(record)
    }

    pub async fn update_report(&self, report_id: Uuid, update: ScoreReportUpdate) -> Result<()> {
        let ScoreReportUpdate {
            status,
            scores,
            recommendations,
            competitor_benchmarks,
            error_message,
            completed_at,
        } = update;

        let result = sqlx::query(
            r#"
            UPDATE score_reports
            SET
                status = COALESCE($2, status),
                overall_score = COALESCE($3, overall_score),
                seo_score = COALESCE($4, seo_score),
                visibility_score = COALESCE($5, visibility_score),
                local_presence_score = COALESCE($6, local_presence_score),
                reputation_score = COALESCE($7, reputation_score),
                recommendations = COALESCE($8, recommendations),
                competitor_benchmarks = COALESCE($9, competitor_benchmarks),
                error_message = COALESCE($10, error_message),
                completed_at = COALESCE($11, completed_at)
            WHERE id = $1
            "#,
        )
        .bind(report_id)
        .bind(status)
        .bind(scores.map(|s| s.overall_score))
        .bind(scores.map(|s| s.seo_score))
        .bind(scores.map(|s| s.visibility_score))
        .bind(scores.map(|s| s.local_presence_score))
        .bind(scores.map(|s| s.reputation_score))
        .bind(recommendations.map(Json))
        .bind(competitor_benchmarks.map(Json))
        .bind(error_message)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!(
                "Score report {report_id} not found"
            )));
        }

        Ok(())
    }

    pub async fn list_reports_for_profile(&self, profile_id: Uuid) -> Result<Vec<ScoreReport>> {
        let records = sqlx::query_as::<_, ScoreReport>(
            r#"
            SELECT
                id,
                business_profile_id,
                scan_type,
                status,
                overall_score,
                seo_score,
                visibility_score,
                local_presence_score,
                reputation_score,
                recommendations,
                competitor_benchmarks,
                error_message,
                created_at,
                completed_at
            FROM score_reports
            WHERE business_profile_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

impl ScoreStore for Database {
    fn create_submission(&self, submission: NewSubmission) -> BoxFuture<'_, Result<BusinessProfile>> {
        Box::pin(Database::create_submission(self, submission))
    }

    fn get_profile_by_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<BusinessProfile>>> {
        Box::pin(Database::get_profile_by_token(self, token))
    }

    fn update_report(
        &self,
        report_id: Uuid,
        update: ScoreReportUpdate,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(Database::update_report(self, report_id, update))
    }

    fn list_reports_for_profile(&self, profile_id: Uuid) -> BoxFuture<'_, Result<Vec<ScoreReport>>> {
        Box::pin(Database::list_reports_for_profile(self, profile_id))
    }
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_before_acquire(true)
}

/// Database the server always has; used to issue `CREATE DATABASE`.
const MAINTENANCE_DATABASE: &str = "postgres";

/// `CREATE DATABASE` for the target of `options`, unless it is the
/// maintenance database itself.
fn create_database_statement(options: &PgConnectOptions) -> Option<String> {
    let name = options
        .get_database()
        .filter(|name| *name != MAINTENANCE_DATABASE)?;
    Some(format!("CREATE DATABASE \"{}\"", name.replace('"', "\"\"")))
}

/// Creates the database named in `options` from the maintenance database.
/// Losing a creation race to another instance (42P04) is fine.
async fn create_database(options: &PgConnectOptions) -> std::result::Result<(), sqlx::Error> {
    let Some(statement) = create_database_statement(options) else {
        return Ok(());
    };

    let mut admin =
        PgConnection::connect_with(&options.clone().database(MAINTENANCE_DATABASE)).await?;

    match admin.execute(statement.as_str()).await {
        Ok(_) => log::info!("{statement} succeeded"),
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database already exists, created concurrently");
        }
        Err(err) => return Err(err),
    }

    admin.close().await
}
