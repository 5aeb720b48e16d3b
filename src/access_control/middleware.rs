//! Access decision middleware
//!
//! Orchestrates the registry, extractor and resolver for every inbound
//! request: route lookup, credential extraction, role resolution, then an
//! allow/deny decision. Unmatched routes are 401 ("cannot even evaluate"),
//! matched-but-denied is 403, allowed requests pass through to the wrapped
//! handler untouched. One structured decision record is emitted per request.
//!
//! Nothing in this path may surface a 5xx: malformed credentials, store
//! failures and over-limit bodies all degrade to a role decision. The one
//! non-decision status is 413, for a body that failed buffering and can no
//! longer be forwarded intact.

use crate::access_control::credentials::{self, RawCredentials};
use crate::access_control::registry::RouteRegistry;
use crate::access_control::resolver::RoleResolver;
use crate::access_control::role::RoleLevel;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Largest JSON body the middleware will buffer for credential extraction
const BODY_BUFFER_LIMIT: usize = 256 * 1024;

/// Outcome of one authorization evaluation
///
/// Request-scoped: created by the engine, consumed for response
/// short-circuiting and the decision log, then dropped.
#[derive(Debug)]
pub struct AccessDecision {
    pub allowed: bool,
    /// 401 (unmatched), 403 (denied) or 200 standing in for pass-through
    pub status: StatusCode,
    /// Role the caller proved; absent when the route never matched
    pub effective_role: Option<RoleLevel>,
    /// Requirement of the matched rule, if any
    pub required_role: Option<RoleLevel>,
    /// Pattern of the matched rule, if any
    pub matched_pattern: Option<String>,
    /// Bearer-token decode error text, for the decision log
    pub token_error: Option<String>,
}

impl AccessDecision {
    fn unmatched() -> Self {
        Self {
            allowed: false,
            status: StatusCode::UNAUTHORIZED,
            effective_role: None,
            required_role: None,
            matched_pattern: None,
            token_error: None,
        }
    }
}

/// The composed authorization engine, shared read-only across requests
pub struct AccessEngine {
    registry: Arc<RouteRegistry>,
    resolver: RoleResolver,
}

impl AccessEngine {
    pub fn new(registry: Arc<RouteRegistry>, resolver: RoleResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// Evaluate one request head (plus optionally buffered body bytes).
    pub async fn evaluate(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> AccessDecision {
        let Some(rule) = self.registry.lookup(path, method) else {
            return AccessDecision::unmatched();
        };

        let raw: RawCredentials = credentials::extract(headers, path, query, body);
        let identity = self.resolver.resolve(&raw).await;
        let effective = identity.effective_role();

        let allowed = rule.allows(effective);
        AccessDecision {
            allowed,
            status: if allowed {
                StatusCode::OK
            } else {
                StatusCode::FORBIDDEN
            },
            effective_role: Some(effective),
            required_role: Some(rule.required_role),
            matched_pattern: Some(rule.pattern.clone()),
            token_error: identity.token_error,
        }
    }
}

/// Axum middleware wrapping every routed request in an access decision.
pub async fn access_middleware(
    State(engine): State<Arc<AccessEngine>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_owned);
    let method = parts.method.to_string();

    // Unmatched requests are rejected on the request head alone; the body
    // is never touched.
    if engine.registry.lookup(&path, &parts.method).is_none() {
        let decision = AccessDecision::unmatched();
        log_decision(&decision, &method, &path, decision.status, started);
        return decision.status.into_response();
    }

    // Buffer JSON bodies for extraction; multipart and other streams are
    // never consumed here. A body whose declared length exceeds the limit
    // is passed through untouched and contributes no credentials; the
    // downstream body is only replaced when buffering succeeded.
    let (body_bytes, downstream_body) = if is_json(&parts.headers)
        && !declared_over_limit(&parts.headers)
    {
        match axum::body::to_bytes(body, BODY_BUFFER_LIMIT).await {
            Ok(bytes) => {
                let downstream = Body::from(bytes.clone());
                (Some(bytes), downstream)
            }
            // Undeclared over-limit body or transport failure. The stream
            // is partially consumed and cannot be forwarded intact, so the
            // request cannot proceed.
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, "request body unreadable");
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
        }
    } else {
        (None, body)
    };

    let decision = engine
        .evaluate(
            &parts.method,
            &path,
            query.as_deref(),
            &parts.headers,
            body_bytes.as_deref(),
        )
        .await;

    if decision.allowed {
        let response = next
            .run(Request::from_parts(parts, downstream_body))
            .await;
        log_decision(&decision, &method, &path, response.status(), started);
        response
    } else {
        log_decision(&decision, &method, &path, decision.status, started);
        decision.status.into_response()
    }
}

fn log_decision(
    decision: &AccessDecision,
    method: &str,
    path: &str,
    status: StatusCode,
    started: Instant,
) {
    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        effective_role = decision
            .effective_role
            .map(|r| r.as_str())
            .unwrap_or("-"),
        required_role = decision
            .required_role
            .map(|r| r.as_str())
            .unwrap_or("-"),
        rule = decision.matched_pattern.as_deref().unwrap_or("-"),
        token_error = decision.token_error.as_deref().unwrap_or(""),
        "access decision"
    );
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

/// Whether the declared `Content-Length` exceeds the buffer limit.
///
/// An absent or unparseable header is not over-limit; the buffering call
/// still enforces the limit on the actual stream.
fn declared_over_limit(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > BODY_BUFFER_LIMIT)
}
