//! `portcullis-core`: identifiers and configuration errors shared by the
//! access-control crates.
//!
//! This crate has no knowledge of roles, rules or requests.

pub mod error;
pub mod id;

pub use error::{ConfigError, ConfigResult};
pub use id::{RequestId, RoleId, UserId};
