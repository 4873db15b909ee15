/// Authentication endpoint tests
///
/// Run with: cargo test -p toadoo-api --test auth_api_tests

mod common;

use axum::http::{header, StatusCode};
use common::{TestContext, PASSWORD};
use serde_json::json;
use toadoo_shared::mailer::MailKind;
use toadoo_shared::store::UserStore;

#[tokio::test]
async fn test_register_returns_public_profile() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": " Amy@Example.COM ", "username": "amy", "password": PASSWORD }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["email"], "amy@example.com");
    assert_eq!(response.body["username"], "amy");
    assert_eq!(response.body["role"], "user");
    assert_eq!(response.body["is_active"], true);
    assert_eq!(response.body["is_verified"], false);
    assert_eq!(response.body["total_completed_count"], 0);
    assert!(response.body.get("password_hash").is_none());

    assert!(ctx
        .mailer
        .last_token(MailKind::Verification, "amy@example.com")
        .is_some());
}

#[tokio::test]
async fn test_register_conflicts_are_bad_requests() {
    let ctx = TestContext::new();
    ctx.register("amy").await;

    let same_email = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "AMY@example.com", "username": "other", "password": PASSWORD }),
        )
        .await;
    assert_eq!(same_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(same_email.body["message"], "Email already registered");

    let same_name = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "fresh@example.com", "username": "amy", "password": PASSWORD }),
        )
        .await;
    assert_eq!(same_name.status, StatusCode::BAD_REQUEST);
    assert_eq!(same_name.body["message"], "Username already taken");
}

#[tokio::test]
async fn test_register_validation_errors() {
    let ctx = TestContext::new();

    let bad_email = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "not-an-email", "username": "amy", "password": PASSWORD }),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(bad_email.body["details"][0]["field"], "email");

    let short_name = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "amy@example.com", "username": "am", "password": PASSWORD }),
        )
        .await;
    assert_eq!(short_name.status, StatusCode::UNPROCESSABLE_ENTITY);

    let weak = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "amy@example.com", "username": "amy", "password": "password1" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(weak.body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_login_by_username_or_email() {
    let ctx = TestContext::new();
    ctx.register("amy").await;

    let by_name = ctx.login("amy", PASSWORD).await;
    assert_eq!(by_name.status, StatusCode::OK);
    assert_eq!(by_name.body["token_type"], "bearer");
    assert_eq!(by_name.body["expires_in"], 1800);

    let by_email = ctx.login("AMY@example.com", PASSWORD).await;
    assert_eq!(by_email.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::new();
    ctx.register("amy").await;

    let wrong_password = ctx.login("amy", "Wrong1234").await;
    let unknown_user = ctx.login("ghost", PASSWORD).await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.raw, unknown_user.raw);
    assert_eq!(wrong_password.body["message"], "Incorrect username or password");
    assert_eq!(
        wrong_password.headers.get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn test_no_lockout_after_failed_logins() {
    let ctx = TestContext::new();
    ctx.register("amy").await;

    for _ in 0..10 {
        assert_eq!(ctx.login("amy", "Wrong1234").await.status, StatusCode::UNAUTHORIZED);
    }

    assert_eq!(ctx.login("amy", PASSWORD).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_inactive_user_cannot_login_or_use_tokens() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;
    ctx.store.set_active(amy.id, false).await.unwrap();

    let login = ctx.login("amy", PASSWORD).await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.body["message"], "User account is inactive");

    let me = ctx.get("/api/auth/me", Some(&amy.access_token)).await;
    assert_eq!(me.status, StatusCode::FORBIDDEN);
    assert_eq!(me.body["message"], "Inactive user");
}

#[tokio::test]
async fn test_me_requires_valid_token() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    assert_eq!(ctx.get("/api/auth/me", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        ctx.get("/api/auth/me", Some("garbage")).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        ctx.get("/api/auth/me", Some(&amy.refresh_token)).await.status,
        StatusCode::UNAUTHORIZED
    );

    let me = ctx.get("/api/auth/me", Some(&amy.access_token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "amy");
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;
    let body = json!({ "refresh_token": amy.refresh_token });

    let first = ctx.post("/api/auth/refresh", None, body.clone()).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_ne!(first.body["refresh_token"], body["refresh_token"]);

    let replay = ctx.post("/api/auth/refresh", None, body).await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["message"], "Invalid or revoked refresh token");

    let next = ctx
        .post(
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": first.body["refresh_token"] }),
        )
        .await;
    assert_eq!(next.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;
    let body = json!({ "refresh_token": amy.refresh_token });

    let logout = ctx
        .post("/api/auth/logout", Some(&amy.access_token), body.clone())
        .await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    assert!(logout.raw.is_empty());

    let again = ctx
        .post("/api/auth/logout", Some(&amy.access_token), body.clone())
        .await;
    assert_eq!(again.status, StatusCode::NO_CONTENT);

    let refresh = ctx.post("/api/auth/refresh", None, body).await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_email_flow() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;
    let token = ctx
        .mailer
        .last_token(MailKind::Verification, &amy.email)
        .unwrap();

    let verified = ctx
        .post("/api/auth/verify-email", None, json!({ "token": token }))
        .await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["is_verified"], true);

    let reused = ctx
        .post("/api/auth/verify-email", None, json!({ "token": token }))
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    assert_eq!(reused.body["message"], "Invalid or expired verification token");

    let resend = ctx
        .post("/api/auth/resend-verification", Some(&amy.access_token), json!({}))
        .await;
    assert_eq!(resend.status, StatusCode::BAD_REQUEST);
    assert_eq!(resend.body["message"], "Email already verified");
}

#[tokio::test]
async fn test_resend_verification_issues_new_token() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;
    let first = ctx
        .mailer
        .last_token(MailKind::Verification, &amy.email)
        .unwrap();

    let resend = ctx
        .post("/api/auth/resend-verification", Some(&amy.access_token), json!({}))
        .await;
    assert_eq!(resend.status, StatusCode::OK);

    let second = ctx
        .mailer
        .last_token(MailKind::Verification, &amy.email)
        .unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_forgot_password_answers_identically() {
    let ctx = TestContext::new();
    ctx.register("amy").await;

    let known = ctx
        .post("/api/auth/forgot-password", None, json!({ "email": "amy@example.com" }))
        .await;
    let unknown = ctx
        .post("/api/auth/forgot-password", None, json!({ "email": "ghost@example.com" }))
        .await;

    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(known.status, unknown.status);
    assert_eq!(known.raw, unknown.raw);
    assert_eq!(
        known.body["message"],
        "If email exists, password reset link has been sent"
    );

    assert!(ctx
        .mailer
        .last_token(MailKind::PasswordReset, "amy@example.com")
        .is_some());
    assert!(ctx
        .mailer
        .last_token(MailKind::PasswordReset, "ghost@example.com")
        .is_none());
}

#[tokio::test]
async fn test_reset_password_revokes_sessions() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    ctx.post("/api/auth/forgot-password", None, json!({ "email": amy.email }))
        .await;
    let token = ctx
        .mailer
        .last_token(MailKind::PasswordReset, &amy.email)
        .unwrap();

    let reset = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": token, "new_password": "N3wSecret" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);

    let refresh = ctx
        .post(
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": amy.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    assert_eq!(ctx.login("amy", PASSWORD).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.login("amy", "N3wSecret").await.status, StatusCode::OK);

    let reused = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": token, "new_password": "An0therOne" }),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_password_rejects_weak_password() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    ctx.post("/api/auth/forgot-password", None, json!({ "email": amy.email }))
        .await;
    let token = ctx
        .mailer
        .last_token(MailKind::PasswordReset, &amy.email)
        .unwrap();

    let reset = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": token, "new_password": "short" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_tokens_of_deleted_account_are_bad_requests() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    let verification = ctx
        .mailer
        .last_token(MailKind::Verification, &amy.email)
        .unwrap();
    ctx.post("/api/auth/forgot-password", None, json!({ "email": amy.email }))
        .await;
    let reset = ctx
        .mailer
        .last_token(MailKind::PasswordReset, &amy.email)
        .unwrap();

    ctx.store.delete_user(amy.id).await.unwrap();

    let verify = ctx
        .post("/api/auth/verify-email", None, json!({ "token": verification }))
        .await;
    assert_eq!(verify.status, StatusCode::BAD_REQUEST);

    let reset = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": reset, "new_password": "N3wSecret" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_update_and_password_change() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;
    ctx.signup("bob").await;

    let taken = ctx
        .put("/api/users/me", Some(&amy.access_token), json!({ "username": "bob" }))
        .await;
    assert_eq!(taken.status, StatusCode::BAD_REQUEST);
    assert_eq!(taken.body["message"], "Username already taken");

    let renamed = ctx
        .put(
            "/api/users/me",
            Some(&amy.access_token),
            json!({ "username": "amelia", "email": "Amelia@Example.com" }),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["username"], "amelia");
    assert_eq!(renamed.body["email"], "amelia@example.com");

    let wrong = ctx
        .post(
            "/api/users/me/change-password",
            Some(&amy.access_token),
            json!({ "old_password": "Wrong1234", "new_password": "N3wSecret" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.body["message"], "Incorrect current password");

    let changed = ctx
        .post(
            "/api/users/me/change-password",
            Some(&amy.access_token),
            json!({ "old_password": PASSWORD, "new_password": "N3wSecret" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(
        changed.body["message"],
        "Password changed successfully. Please login again."
    );

    let refresh = ctx
        .post(
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": amy.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.login("amelia", "N3wSecret").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_own_account() {
    let ctx = TestContext::new();
    let amy = ctx.signup("amy").await;

    let deleted = ctx.delete("/api/users/me", Some(&amy.access_token)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    assert!(ctx.store.user_by_id(amy.id).await.unwrap().is_none());
    assert_eq!(
        ctx.get("/api/users/me", Some(&amy.access_token)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(ctx.register("amy").await.status, StatusCode::CREATED);
}
