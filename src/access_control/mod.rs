//! Request authorization engine
//!
//! Four pieces composed per request, leaf-first:
//!
//! - [`registry`] — ordered route registry and path matcher
//! - [`credentials`] — credential extraction with source precedence
//! - [`resolver`] — role resolution against ownership lookups
//! - [`middleware`] — the allow/deny decision wrapped around every request
//!
//! The registry is built once at startup and shared read-only; everything
//! else is request-scoped.

pub mod credentials;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod role;

pub use credentials::{ADMIN_SECRET_HEADER, RawCredentials};
pub use middleware::{AccessDecision, AccessEngine, access_middleware};
pub use registry::{RouteRegistry, RouteRegistryBuilder, RouteRule};
pub use resolver::{PersistenceReader, RoleResolver};
pub use role::{ResolvedIdentity, RoleLevel};
