//! Common test utilities for API tests
//!
//! Builds the full router over the in-memory store and a recording mailer,
//! and drives it with `tower::ServiceExt::oneshot`. No database is needed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use toadoo_api::app::{build_router, AppState};
use toadoo_api::config::Config;
use toadoo_shared::auth::password::HashParams;
use toadoo_shared::mailer::{MailKind, RecordingMailer};
use toadoo_shared::models::user::UserRole;
use toadoo_shared::store::memory::MemoryStore;
use toadoo_shared::store::UserStore;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Passw0rd";
const SECRET: &str = "api-test-secret-key-at-least-32-bytes";

/// Test context containing the router and its backing fakes
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

/// Captured response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub raw: Bytes,
    pub body: Value,
}

/// A registered, logged-in user
pub struct Session {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Context with extra configuration variables
    pub fn with_vars(pairs: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("DATABASE_URL".into(), "postgresql://unused/toadoo".into());
        vars.insert("JWT_SECRET".into(), SECRET.into());
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }

        let mut config = Config::from_vars(move |key| vars.get(key).cloned()).unwrap();
        config.argon2 = HashParams::light();

        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::new(store.clone(), mailer.clone(), config).unwrap();

        Self {
            app: build_router(state),
            store,
            mailer,
        }
    }

    /// Sends a request and buffers the response
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let raw = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if raw.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            raw,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Registers `name` and returns the created user body
    pub async fn register(&self, name: &str) -> TestResponse {
        self.post(
            "/api/auth/register",
            None,
            json!({
                "email": format!("{}@example.com", name),
                "username": name,
                "password": PASSWORD,
            }),
        )
        .await
    }

    pub async fn login(&self, identifier: &str, password: &str) -> TestResponse {
        self.post(
            "/api/auth/login",
            None,
            json!({ "username": identifier, "password": password }),
        )
        .await
    }

    /// Registers and logs in `name`
    pub async fn signup(&self, name: &str) -> Session {
        let registered = self.register(name).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);

        let login = self.login(name, PASSWORD).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        Session {
            id: registered.body["id"].as_str().unwrap().parse().unwrap(),
            username: name.to_string(),
            email: format!("{}@example.com", name),
            access_token: login.body["access_token"].as_str().unwrap().to_string(),
            refresh_token: login.body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Registers `name` and promotes them to admin
    pub async fn admin(&self, name: &str) -> Session {
        let session = self.signup(name).await;
        self.store
            .set_role(session.id, UserRole::Admin)
            .await
            .unwrap()
            .unwrap();
        session
    }

    /// Completes email verification through the recorded mail
    pub async fn verify(&self, session: &Session) {
        let token = self
            .mailer
            .last_token(MailKind::Verification, &session.email)
            .unwrap();
        let response = self
            .post("/api/auth/verify-email", None, json!({ "token": token }))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    }
}
