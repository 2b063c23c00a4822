pub mod auth;
pub mod content;
pub mod org;
pub mod user;
