//! Integration tests for the job and edit repositories.
//!
//! Exercises the claim protocol against a real database:
//! - Submission creates a linked edit and job
//! - Eligibility excludes terminal, exhausted and leased jobs
//! - Only one concurrent claimant wins
//! - Writes by a stale lease holder are rejected
//! - Payload patches merge without dropping earlier keys

use assert_matches::assert_matches;
use editflow_core::edit_status::EditStatus;
use editflow_core::job::{EditRecord, JobRecord};
use editflow_core::stage::Stage;
use editflow_core::submission::SubmitEdit;
use editflow_db::models::job::{
    AdvanceJob, ClaimJob, FailJobStep, FailUnreadableJob, ImageProcessingJob,
};
use editflow_db::repositories::{EditRepo, JobRepo};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn submission(prompt: &str) -> SubmitEdit {
    SubmitEdit {
        original_image_url: "https://cdn.example.com/cat.png".to_string(),
        original_image_filename: "cat.png".to_string(),
        user_prompt: prompt.to_string(),
    }
}

async fn submit(pool: &PgPool, prompt: &str) -> ImageProcessingJob {
    let (_, job) = EditRepo::submit(pool, &"user_1".to_string(), &submission(prompt))
        .await
        .unwrap();
    job
}

fn claim_of(job: &ImageProcessingJob, claimed: Stage) -> ClaimJob {
    ClaimJob {
        job_id: job.id,
        expected_stage: job.current_stage.parse().unwrap(),
        observed_lease: job.lease_token,
        observed_retry_count: job.retry_count,
        claimed_stage: claimed,
        lease_token: Some(uuid::Uuid::new_v4()),
        lease_secs: 300,
        max_retries: 3,
        retry_count: job.retry_count,
        last_error: None,
    }
}

async fn expire(pool: &PgPool, id: uuid::Uuid) -> ImageProcessingJob {
    sqlx::query_as(
        "UPDATE image_processing_jobs SET lease_expires_at = NOW() - INTERVAL '1 second' \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn submit_links_edit_and_job(pool: PgPool) {
    let (edit, job) = EditRepo::submit(&pool, &"user_1".to_string(), &submission("brighter"))
        .await
        .unwrap();

    assert_eq!(edit.job_id, Some(job.id));
    assert_eq!(job.edit_id, edit.id);

    let edit = EditRecord::try_from(edit).unwrap();
    assert_eq!(edit.status, EditStatus::Pending);

    let job = JobRecord::try_from(job).unwrap();
    assert_eq!(job.stage, Stage::PendingDescribe);
    assert_eq!(job.retry_count, 0);
    assert_eq!(job.payload.user_prompt.as_deref(), Some("brighter"));
    assert_eq!(job.payload.original_image_filename.as_deref(), Some("cat.png"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_job_for_same_edit_is_rejected(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let err = JobRepo::create(&pool, job.edit_id, "user_1", &Default::default())
        .await
        .unwrap_err();
    let constraint = err.as_database_error().and_then(|e| e.constraint().map(str::to_owned));
    assert_eq!(constraint.as_deref(), Some("uq_image_processing_jobs_edit_id"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lookups_are_scoped_to_owner(pool: PgPool) {
    let job = submit(&pool, "p").await;
    assert!(JobRepo::find_for_user(&pool, job.id, &"user_1".to_string())
        .await
        .unwrap()
        .is_some());
    assert!(JobRepo::find_for_user(&pool, job.id, &"user_2".to_string())
        .await
        .unwrap()
        .is_none());
    assert!(EditRepo::find_for_user(&pool, job.edit_id, &"user_2".to_string())
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_for_user_is_newest_first(pool: PgPool) {
    let first = submit(&pool, "first").await;
    let second = submit(&pool, "second").await;

    let edits = EditRepo::list_for_user(&pool, &"user_1".to_string(), None, None)
        .await
        .unwrap();
    let ids: Vec<_> = edits.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![second.edit_id, first.edit_id]);

    let page = EditRepo::list_for_user(&pool, &"user_1".to_string(), Some(1), Some(1))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, first.edit_id);
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_eligible_orders_oldest_first_and_limits(pool: PgPool) {
    let a = submit(&pool, "a").await;
    let b = submit(&pool, "b").await;
    let _c = submit(&pool, "c").await;

    let eligible = JobRepo::list_eligible(&pool, 3, 2).await.unwrap();
    let ids: Vec<_> = eligible.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_eligible_skips_terminal_exhausted_and_leased(pool: PgPool) {
    let terminal = submit(&pool, "terminal").await;
    let exhausted = submit(&pool, "exhausted").await;
    let leased = submit(&pool, "leased").await;
    let expired = submit(&pool, "expired").await;

    sqlx::query("UPDATE image_processing_jobs SET current_stage = 'completed' WHERE id = $1")
        .bind(terminal.id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE image_processing_jobs SET retry_count = 3 WHERE id = $1")
        .bind(exhausted.id)
        .execute(&pool)
        .await
        .unwrap();
    JobRepo::claim(&pool, &claim_of(&leased, Stage::DescribingImage))
        .await
        .unwrap()
        .unwrap();
    JobRepo::claim(&pool, &claim_of(&expired, Stage::DescribingImage))
        .await
        .unwrap()
        .unwrap();
    sqlx::query(
        "UPDATE image_processing_jobs SET lease_expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(expired.id)
    .execute(&pool)
    .await
    .unwrap();

    let eligible = JobRepo::list_eligible(&pool, 3, 10).await.unwrap();
    let ids: Vec<_> = eligible.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![expired.id]);
    assert_eq!(eligible[0].current_stage, "describing_image");
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_sets_stage_and_lease(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let claim = claim_of(&job, Stage::DescribingImage);

    let claimed = JobRepo::claim(&pool, &claim).await.unwrap().unwrap();
    assert_eq!(claimed.current_stage, "describing_image");
    assert_eq!(claimed.lease_token, claim.lease_token);
    assert!(claimed.lease_expires_at.is_some());
    assert_eq!(claimed.retry_count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_claims_have_one_winner(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let first = claim_of(&job, Stage::DescribingImage);
    let second = claim_of(&job, Stage::DescribingImage);

    let (a, b) = tokio::join!(JobRepo::claim(&pool, &first), JobRepo::claim(&pool, &second));
    let winners = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(Option::is_some)
        .count();
    assert_eq!(winners, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_with_stale_observation_loses(pool: PgPool) {
    let job = submit(&pool, "p").await;
    JobRepo::claim(&pool, &claim_of(&job, Stage::DescribingImage))
        .await
        .unwrap()
        .unwrap();

    // Same snapshot, second attempt: stage no longer matches.
    let lost = JobRepo::claim(&pool, &claim_of(&job, Stage::DescribingImage))
        .await
        .unwrap();
    assert!(lost.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lease_can_be_reclaimed_at_same_stage(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let claimed = JobRepo::claim(&pool, &claim_of(&job, Stage::DescribingImage))
        .await
        .unwrap()
        .unwrap();
    let expired = expire(&pool, claimed.id).await;

    let mut reclaim = claim_of(&expired, Stage::DescribingImage);
    reclaim.retry_count = 1;
    reclaim.last_error = Some("lease expired".into());
    let reclaimed = JobRepo::claim(&pool, &reclaim).await.unwrap().unwrap();
    assert_eq!(reclaimed.lease_token, reclaim.lease_token);
    assert_eq!(reclaimed.retry_count, 1);
    assert_eq!(reclaimed.last_error.as_deref(), Some("lease expired"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reclaim_can_fail_the_job_without_a_lease(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let claimed = JobRepo::claim(&pool, &claim_of(&job, Stage::DescribingImage))
        .await
        .unwrap()
        .unwrap();
    let expired = expire(&pool, claimed.id).await;

    let mut reclaim = claim_of(&expired, Stage::Failed);
    reclaim.lease_token = None;
    reclaim.retry_count = 1;
    reclaim.last_error = Some("lease expired".into());
    let failed = JobRepo::claim(&pool, &reclaim).await.unwrap().unwrap();
    assert_eq!(failed.current_stage, "failed");
    assert_eq!(failed.lease_token, None);
    assert_eq!(failed.lease_expires_at, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_with_stale_retry_count_loses(pool: PgPool) {
    let job = submit(&pool, "p").await;
    sqlx::query("UPDATE image_processing_jobs SET retry_count = 1 WHERE id = $1")
        .bind(job.id)
        .execute(&pool)
        .await
        .unwrap();
    assert!(JobRepo::claim(&pool, &claim_of(&job, Stage::DescribingImage))
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_refuses_exhausted_job(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let mut claim = claim_of(&job, Stage::DescribingImage);
    claim.max_retries = 0;
    assert!(JobRepo::claim(&pool, &claim).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Writes under lease
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn advance_merges_patch_and_releases_lease(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let claim = claim_of(&job, Stage::DescribingImage);
    JobRepo::claim(&pool, &claim).await.unwrap().unwrap();

    let advanced = JobRepo::advance(
        &pool,
        &AdvanceJob {
            job_id: job.id,
            lease_token: claim.lease_token.unwrap(),
            next_stage: Stage::PendingTranslate,
            patch: json!({ "aiImageDescription": "a cat on a sofa" }),
            renew_lease_secs: None,
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(advanced.current_stage, "pending_translate");
    assert_eq!(advanced.lease_token, None);
    assert_eq!(advanced.lease_expires_at, None);
    assert_eq!(advanced.stage_payload["aiImageDescription"], "a cat on a sofa");
    assert_eq!(advanced.stage_payload["originalImageUrl"], "https://cdn.example.com/cat.png");
    assert_eq!(advanced.stage_payload["originalImageFilename"], "cat.png");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn advance_can_keep_the_lease(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let claim = claim_of(&job, Stage::DescribingImage);
    JobRepo::claim(&pool, &claim).await.unwrap().unwrap();

    let advanced = JobRepo::advance(
        &pool,
        &AdvanceJob {
            job_id: job.id,
            lease_token: claim.lease_token.unwrap(),
            next_stage: Stage::PendingTranslate,
            patch: json!({}),
            renew_lease_secs: Some(60),
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(advanced.lease_token, claim.lease_token);
    assert!(advanced.lease_expires_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_lease_holder_cannot_write(pool: PgPool) {
    let job = submit(&pool, "p").await;
    JobRepo::claim(&pool, &claim_of(&job, Stage::DescribingImage))
        .await
        .unwrap()
        .unwrap();

    let stale = uuid::Uuid::new_v4();
    let advanced = JobRepo::advance(
        &pool,
        &AdvanceJob {
            job_id: job.id,
            lease_token: stale,
            next_stage: Stage::PendingTranslate,
            patch: json!({ "aiImageDescription": "x" }),
            renew_lease_secs: None,
        },
    )
    .await
    .unwrap();
    assert!(advanced.is_none());

    let failed = JobRepo::record_failure(
        &pool,
        &FailJobStep {
            job_id: job.id,
            lease_token: stale,
            stage: Stage::Failed,
            retry_count: 3,
            error: "x".into(),
        },
    )
    .await
    .unwrap();
    assert!(failed.is_none());

    let current = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(current.current_stage, "describing_image");
    assert!(current.stage_payload.get("aiImageDescription").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_failure_releases_to_pending_stage(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let claim = claim_of(&job, Stage::DescribingImage);
    JobRepo::claim(&pool, &claim).await.unwrap().unwrap();

    let released = JobRepo::record_failure(
        &pool,
        &FailJobStep {
            job_id: job.id,
            lease_token: claim.lease_token.unwrap(),
            stage: Stage::PendingDescribe,
            retry_count: 1,
            error: "vision timeout".into(),
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(released.current_stage, "pending_describe");
    assert_eq!(released.retry_count, 1);
    assert_eq!(released.last_error.as_deref(), Some("vision timeout"));
    assert_eq!(released.lease_token, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unreadable_row_failure_matches_raw_columns(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let failure = |observed_retry_count, retry_count, give_up| FailUnreadableJob {
        job_id: job.id,
        observed_stage: "pending_describe".into(),
        observed_lease: None,
        observed_retry_count,
        retry_count,
        give_up,
        error: "unreadable stage_payload".into(),
    };

    let counted = JobRepo::record_unreadable(&pool, &failure(0, 1, false))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counted.current_stage, "pending_describe");
    assert_eq!(counted.retry_count, 1);
    assert_eq!(counted.last_error.as_deref(), Some("unreadable stage_payload"));

    assert!(JobRepo::record_unreadable(&pool, &failure(0, 1, false))
        .await
        .unwrap()
        .is_none());

    let failed = JobRepo::record_unreadable(&pool, &failure(1, 2, true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.current_stage, "failed");
    assert_eq!(failed.retry_count, 2);
}

// ---------------------------------------------------------------------------
// Edit status guards
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn edit_status_never_moves_backwards(pool: PgPool) {
    let job = submit(&pool, "p").await;

    assert!(EditRepo::mark_processing(&pool, job.edit_id).await.unwrap());
    assert!(!EditRepo::mark_processing(&pool, job.edit_id).await.unwrap());
    assert!(EditRepo::complete(&pool, job.edit_id, "https://cdn/x.png", "edited_cat.png")
        .await
        .unwrap());
    assert!(!EditRepo::fail(&pool, job.edit_id, "late failure").await.unwrap());

    let edit = EditRepo::find_by_id(&pool, job.edit_id).await.unwrap().unwrap();
    let edit = EditRecord::try_from(edit).unwrap();
    assert_matches!(edit.status, EditStatus::Completed);
    assert_eq!(edit.edited_image_filename.as_deref(), Some("edited_cat.png"));
    assert_eq!(edit.error_message, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn edited_fields_require_completed_status(pool: PgPool) {
    let job = submit(&pool, "p").await;
    let err = sqlx::query("UPDATE edits SET edited_image_url = 'x' WHERE id = $1")
        .bind(job.edit_id)
        .execute(&pool)
        .await
        .unwrap_err();
    let constraint = err.as_database_error().and_then(|e| e.constraint().map(str::to_owned));
    assert_eq!(constraint.as_deref(), Some("ck_edits_edited_fields_completed_only"));
}
