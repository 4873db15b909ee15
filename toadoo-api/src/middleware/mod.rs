/// Middleware modules for the API server
///
/// - `auth`: bearer credential guards
/// - `security`: response hardening headers

pub mod auth;
pub mod security;
