//! Scheduler trigger: authentication, batch summaries and end-to-end progress.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, submit_edit, token_for, trigger, CRON_SECRET};
use editflow_capabilities::fakes::FakeCapabilities;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_secret_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = trigger(app, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn wrong_secret_is_rejected_without_running(pool: PgPool) {
    let fakes = FakeCapabilities::new();
    let app = common::build_test_app_with(pool, &fakes);
    submit_edit(app.clone(), "user_1", "make it brighter").await;

    let response = trigger(app, Some("not-the-secret")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(fakes.vision.calls(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_queue_reports_no_pending_jobs(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = trigger(app, Some(CRON_SECRET)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "No pending jobs found");
    assert_eq!(json["processed"], 0);
    assert_eq!(json["results"], serde_json::json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn trigger_advances_one_stage(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, job_id) = submit_edit(app.clone(), "user_1", "make it brighter").await;

    let json = body_json(trigger(app.clone(), Some(CRON_SECRET)).await).await;
    assert_eq!(json["message"], "Jobs processed");
    assert_eq!(json["processed"], 1);
    assert_eq!(json["results"][0]["jobId"], job_id.as_str());
    assert_eq!(json["results"][0]["status"], "stage_advanced");

    let uri = format!("/api/v1/jobs/{job_id}/status");
    let status = body_json(get_auth(app, &uri, &token_for("user_1")).await).await;
    assert_eq!(status["status"], "pending_translate");
    assert!(status["stagePayload"]["aiImageDescription"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn three_triggers_complete_an_edit(pool: PgPool) {
    let fakes = FakeCapabilities::new();
    let app = common::build_test_app_with(pool, &fakes);
    let (edit_id, job_id) = submit_edit(app.clone(), "user_1", "make it brighter").await;

    for _ in 0..2 {
        let json = body_json(trigger(app.clone(), Some(CRON_SECRET)).await).await;
        assert_eq!(json["results"][0]["status"], "stage_advanced");
    }
    let json = body_json(trigger(app.clone(), Some(CRON_SECRET)).await).await;
    assert_eq!(json["results"][0]["status"], "completed");

    let token = token_for("user_1");
    let status = body_json(get_auth(app.clone(), &format!("/api/v1/jobs/{job_id}/status"), &token).await).await;
    assert_eq!(status["status"], "completed");
    assert!(status["stagePayload"]["editedImageUrl"].is_string());

    let edit = body_json(get_auth(app, &format!("/api/v1/edits/{edit_id}"), &token).await).await;
    assert_eq!(edit["data"]["status"], "completed");
    assert_eq!(edit["data"]["editedImageFilename"], "edited_cat.png");
    assert_eq!(fakes.storage.uploads().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn capability_failure_is_reported_per_job(pool: PgPool) {
    let fakes = FakeCapabilities::new();
    fakes.vision.push_err("quota exceeded");
    let app = common::build_test_app_with(pool, &fakes);
    let (_, job_id) = submit_edit(app.clone(), "user_1", "make it brighter").await;

    let response = trigger(app.clone(), Some(CRON_SECRET)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["results"][0]["status"], "error");
    assert!(json["results"][0]["error"].as_str().unwrap().contains("quota exceeded"));

    let uri = format!("/api/v1/jobs/{job_id}/status");
    let status = body_json(get_auth(app, &uri, &token_for("user_1")).await).await;
    assert_eq!(status["status"], "pending_describe");
    assert_eq!(status["retryCount"], 1);
    assert!(status["lastError"].as_str().unwrap().contains("quota exceeded"));
}
