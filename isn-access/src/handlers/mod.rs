//! HTTP handlers for isn-access.

pub mod account;
pub mod admin;
pub mod auth;
pub mod oauth;

pub use account::*;
pub use admin::*;
pub use auth::*;
pub use oauth::*;
