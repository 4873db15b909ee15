/// Admin, health and root endpoint tests
///
/// Run with: cargo test -p toadoo-api --test admin_api_tests

mod common;

use axum::http::StatusCode;
use common::{TestContext, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    let anonymous = ctx.get("/api/admin/users", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let regular = ctx.get("/api/admin/users", Some(&amy.access_token)).await;
    assert_eq!(regular.status, StatusCode::FORBIDDEN);
    assert_eq!(regular.body["message"], "Not enough permissions");

    let stats = ctx.get("/api/admin/stats", Some(&amy.access_token)).await;
    assert_eq!(stats.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_and_get_users() {
    let ctx = TestContext::new();
    let root = ctx.admin("root").await;
    let amy = ctx.signup("amy").await;

    let all = ctx.get("/api/admin/users", Some(&root.access_token)).await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body.as_array().unwrap().len(), 2);
    assert!(all.body[0].get("updated_at").is_some());
    assert!(all.body[0].get("password_hash").is_none());

    let admins = ctx
        .get("/api/admin/users?role=admin", Some(&root.access_token))
        .await;
    assert_eq!(admins.body.as_array().unwrap().len(), 1);
    assert_eq!(admins.body[0]["username"], "root");

    let one = ctx
        .get(&format!("/api/admin/users/{}", amy.id), Some(&root.access_token))
        .await;
    assert_eq!(one.status, StatusCode::OK);
    assert_eq!(one.body["username"], "amy");

    let missing = ctx
        .get(
            &format!("/api/admin/users/{}", uuid::Uuid::new_v4()),
            Some(&root.access_token),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_target_self() {
    let ctx = TestContext::new();
    let root = ctx.admin("root").await;
    let uri = format!("/api/admin/users/{}", root.id);

    let role = ctx
        .put(&format!("{}/role", uri), Some(&root.access_token), json!({ "role": "user" }))
        .await;
    assert_eq!(role.status, StatusCode::BAD_REQUEST);
    assert_eq!(role.body["message"], "Cannot change your own role");

    let status = ctx
        .put(
            &format!("{}/status", uri),
            Some(&root.access_token),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status.status, StatusCode::BAD_REQUEST);
    assert_eq!(status.body["message"], "Cannot deactivate your own account");

    let delete = ctx.delete(&uri, Some(&root.access_token)).await;
    assert_eq!(delete.status, StatusCode::BAD_REQUEST);
    assert_eq!(delete.body["message"], "Cannot delete your own account");
}

#[tokio::test]
async fn test_role_change_grants_admin_access() {
    let ctx = TestContext::new();
    let root = ctx.admin("root").await;
    let amy = ctx.signup("amy").await;

    let promoted = ctx
        .put(
            &format!("/api/admin/users/{}/role", amy.id),
            Some(&root.access_token),
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["role"], "admin");

    let stats = ctx.get("/api/admin/stats", Some(&amy.access_token)).await;
    assert_eq!(stats.status, StatusCode::OK);
}

#[tokio::test]
async fn test_deactivation_locks_out_user() {
    let ctx = TestContext::new();
    let root = ctx.admin("root").await;
    let amy = ctx.signup("amy").await;

    let deactivated = ctx
        .put(
            &format!("/api/admin/users/{}/status", amy.id),
            Some(&root.access_token),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(deactivated.status, StatusCode::OK);
    assert_eq!(deactivated.body["is_active"], false);

    assert_eq!(
        ctx.get("/api/todos", Some(&amy.access_token)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(ctx.login("amy", PASSWORD).await.status, StatusCode::FORBIDDEN);

    let refresh = ctx
        .post(
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": amy.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    let inactive = ctx
        .get("/api/admin/users?is_active=false", Some(&root.access_token))
        .await;
    assert_eq!(inactive.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_user_cascades() {
    let ctx = TestContext::new();
    let root = ctx.admin("root").await;
    let amy = ctx.signup("amy").await;

    ctx.post("/api/todos", Some(&amy.access_token), json!({ "title": "a" }))
        .await;
    ctx.post("/api/todos", Some(&root.access_token), json!({ "title": "b" }))
        .await;

    let everything = ctx.get("/api/admin/todos", Some(&root.access_token)).await;
    assert_eq!(everything.body.as_array().unwrap().len(), 2);

    let deleted = ctx
        .delete(&format!("/api/admin/users/{}", amy.id), Some(&root.access_token))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let amy_todos = ctx
        .get(
            &format!("/api/admin/todos?user_id={}", amy.id),
            Some(&root.access_token),
        )
        .await;
    assert_eq!(amy_todos.body.as_array().unwrap().len(), 0);

    let remaining = ctx.get("/api/admin/todos", Some(&root.access_token)).await;
    assert_eq!(remaining.body.as_array().unwrap().len(), 1);

    assert_eq!(
        ctx.get("/api/auth/me", Some(&amy.access_token)).await.status,
        StatusCode::UNAUTHORIZED
    );

    let again = ctx
        .delete(&format!("/api/admin/users/{}", amy.id), Some(&root.access_token))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_and_sweep() {
    let ctx = TestContext::new();
    let root = ctx.admin("root").await;
    let amy = ctx.signup("amy").await;

    ctx.post(
        "/api/todos",
        Some(&amy.access_token),
        json!({ "title": "a", "status": "completed" }),
    )
    .await;
    ctx.post("/api/todos", Some(&amy.access_token), json!({ "title": "b" }))
        .await;

    let stats = ctx.get("/api/admin/stats", Some(&root.access_token)).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["users"]["total"], 2);
    assert_eq!(stats.body["users"]["admins"], 1);
    assert_eq!(stats.body["users"]["active"], 2);
    assert_eq!(stats.body["users"]["inactive"], 0);
    assert_eq!(stats.body["todos"]["total"], 2);
    assert_eq!(stats.body["todos"]["completed"], 1);
    assert_eq!(stats.body["todos"]["pending"], 1);
    assert_eq!(stats.body["todos"]["in_progress"], 0);

    let sweep = ctx
        .post("/api/admin/maintenance/sweep-tokens", Some(&root.access_token), json!({}))
        .await;
    assert_eq!(sweep.status, StatusCode::OK);
    assert_eq!(sweep.body["total"], 0);
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let response = ctx.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["database"], "connected");
    assert_eq!(response.body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(response.headers.get("X-Content-Type-Options").unwrap(), "nosniff");
}

#[tokio::test]
async fn test_root_greets_signed_in_users() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    let anonymous = ctx.get("/", None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.body["message"], "Welcome to Toadoo!");
    assert!(anonymous.body.get("username").is_none());

    let garbage = ctx.get("/", Some("not-a-token")).await;
    assert_eq!(garbage.status, StatusCode::OK);
    assert!(garbage.body.get("username").is_none());

    let signed_in = ctx.get("/", Some(&amy.access_token)).await;
    assert_eq!(signed_in.body["message"], "Welcome to Toadoo, amy!");
    assert_eq!(signed_in.body["username"], "amy");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let ctx = TestContext::new();
    assert_eq!(ctx.get("/api/nope", None).await.status, StatusCode::NOT_FOUND);
}
