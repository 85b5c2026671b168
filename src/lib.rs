//! # authx (Accounts, Sessions & Suspensions)
//!
//! `authx` registers accounts, verifies credentials, issues bearer sessions
//! and enforces suspensions for a networked service.
//!
//! ## Sessions
//!
//! Tokens are HS256-signed and carry `{user_id, jti, iat, exp}`. A signature
//! alone is not enough: every validation also looks up the `jti` in a durable
//! whitelist, so revoking a session (or banning its owner) takes effect
//! immediately. Sessions slide forward once less than half their original
//! lifetime remains, and any store failure during validation rejects the
//! token.
//!
//! ## Registration
//!
//! Public registration proves ownership of the email with a six digit
//! one-time code, rate limited per email and per client address. Account ids
//! come from an atomic counter in the store, so concurrent instances never
//! hand out the same id.
//!
//! ## Suspensions
//!
//! Bans are append-only records. Placing one revokes every session of the
//! user; lifting one deactivates the records and keeps the history.

pub mod api;
pub mod cli;
pub mod identity;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
