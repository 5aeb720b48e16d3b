//! stagepass
//!
//! Request authorization engine for a collaborative music-editing backend
//! (groups, songs, media edits, time-slot booking). Every inbound request
//! is classified into an allow/deny decision before any handler runs, with
//! a fail-closed default and deterministic tie-breaking.
//!
//! ## Authorization model
//!
//! ```text
//! route registry (pattern, method) -> required role + subroles flag
//! credentials: header > query > body, path segments win for resources
//! roles:      admin < group_creator < edit_creator < group_member < external
//! decision:   unmatched -> 401, denied -> 403, allowed -> pass-through
//! ```
//!
//! The registry is an explicitly constructed, immutable object injected
//! into the middleware at startup; tests substitute alternate registries
//! without touching global state.

pub mod access_control;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;
pub mod util;

// Re-export main types
pub use access_control::{AccessEngine, RoleLevel, RouteRegistry, access_middleware};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
