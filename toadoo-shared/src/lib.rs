//! # toadoo shared library
//!
//! Domain types, persistence and the authentication core shared by the
//! `toadoo-api` server and the `toadoo` operator CLI.
//!
//! ## Module Organization
//!
//! - `models`: domain models and their PostgreSQL queries
//! - `store`: persistence traits with PostgreSQL and in-memory implementations
//! - `db`: connection pool and migrations
//! - `auth`: hashing, token codec, request guard and auth service
//! - `mailer`: outbound mail collaborator

pub mod auth;
pub mod db;
pub mod mailer;
pub mod models;
pub mod store;

/// Current version of the toadoo shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
