mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn core_routes_reject_missing_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let resp = reqwest::Client::new()
        .get(server.url("/api/v1/core/economic_activities?cuui_id=0111"))
        .header("x-tenant-id", common::TENANT)
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "ERR_UNAUTHORIZED");
    assert_eq!(body["status"], 401);
    Ok(())
}

#[tokio::test]
async fn core_routes_reject_garbage_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let resp = reqwest::Client::new()
        .get(server.url("/api/v1/core/users/me"))
        .header("x-tenant-id", common::TENANT)
        .bearer_auth("not.a.jwt")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_requires_tenant_header() -> Result<()> {
    let server = common::ensure_server().await?;

    let resp = reqwest::Client::new()
        .post(server.url("/api/v1/auth/login"))
        .json(&serde_json::json!({ "username": "ana", "password": "s3cret-pass" }))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "ERR_TENANT_REQUIRED");
    Ok(())
}
