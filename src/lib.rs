//! # Members
//!
//! Membership registration and login over HTTP.
//!
//! ## Credentials
//!
//! Passwords are hashed with HMAC-SHA-512 keyed by a random 128-byte per-account
//! salt. Verification recomputes the digest and compares it in fixed time.
//!
//! ## Usernames
//!
//! Usernames are case-insensitive: they are lowercased before storage and before
//! every lookup. The store's unique constraint decides concurrent registrations.
//!
//! ## Login failures
//!
//! An unknown username and a wrong password produce the same `401 Invalid credentials`
//! response so accounts cannot be probed.

pub mod account;
pub mod cli;
pub mod members;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
