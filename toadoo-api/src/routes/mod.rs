/// API route handlers
///
/// Organized by resource:
///
/// - `health`: liveness probe and welcome page
/// - `auth`: registration, sessions, verification and password reset
/// - `users`: self-service profile management
/// - `todos`: owner-scoped todos, harvest and leaderboard
/// - `admin`: unscoped management endpoints

pub mod admin;
pub mod auth;
pub mod health;
pub mod todos;
pub mod users;

use serde::{Deserialize, Serialize};

/// Plain `{"message": ...}` body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
