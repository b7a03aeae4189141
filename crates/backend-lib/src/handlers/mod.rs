// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers grouped by area.

pub mod auth;
pub mod records;
pub mod submissions;
pub mod system;
