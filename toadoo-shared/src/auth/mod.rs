/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id credential hashing and strength rules
/// - [`jwt`]: access/refresh token codec
/// - [`opaque`]: random single-use tokens and the SHA-256 digests stored for every token
/// - [`guard`]: bearer credential resolution with layered requirements
/// - [`service`]: register, login, refresh rotation, logout, email verification, password reset
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id, 64 MB memory, 3 passes by default
/// - **Tokens**: HMAC-signed JWTs, refresh tokens backed by a revocable store row
/// - **Storage**: token digests only, never token text
/// - **Enumeration**: login and forgot-password answer identically for unknown accounts

pub mod guard;
pub mod jwt;
pub mod opaque;
pub mod password;
pub mod service;
