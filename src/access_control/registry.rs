//! Route registry and path matcher
//!
//! Maps (normalized path, HTTP method) to the access requirement registered
//! for that route. Matching is two-phase: an exact hit on the registry key
//! always wins, otherwise patterns are tried segment-wise in registration
//! order. Absence is a first-class result, not an error.

use crate::access_control::role::RoleLevel;
use crate::error::ConfigError;
use axum::http::Method;
use std::collections::HashMap;

/// A single route access requirement, immutable after registration
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Path template with literal segments and `{name}` placeholders
    pub pattern: String,
    /// HTTP method this rule applies to
    pub method: Method,
    /// Role required to pass this route
    pub required_role: RoleLevel,
    /// When true the rule is satisfied by `required_role` or anything more
    /// privileged; when false only by exactly `required_role`.
    pub include_subroles: bool,
}

impl RouteRule {
    /// Whether a caller with `effective` role passes this rule.
    pub fn allows(&self, effective: RoleLevel) -> bool {
        if self.include_subroles {
            effective.satisfies(self.required_role)
        } else {
            effective == self.required_role
        }
    }

    fn key(&self) -> (String, Method) {
        (self.pattern.clone(), self.method.clone())
    }
}

/// Immutable registry of route rules
///
/// Built once at startup via [`RouteRegistry::builder`] and shared read-only
/// across all in-flight requests; it is never a process-wide singleton, so
/// tests can substitute alternate registries freely.
#[derive(Debug)]
pub struct RouteRegistry {
    /// All rules in registration order (pattern scan order)
    rules: Vec<RouteRule>,
    /// Exact-key index into `rules`
    exact: HashMap<(String, Method), usize>,
}

/// Builder for [`RouteRegistry`]
#[derive(Debug, Default)]
pub struct RouteRegistryBuilder {
    rules: Vec<RouteRule>,
}

impl RouteRegistryBuilder {
    /// Register a route rule. Registration order is significant for
    /// variable-pattern tie-breaking.
    pub fn rule(
        mut self,
        pattern: impl Into<String>,
        method: Method,
        required_role: RoleLevel,
        include_subroles: bool,
    ) -> Self {
        self.rules.push(RouteRule {
            pattern: normalize_path(&pattern.into()).to_string(),
            method,
            required_role,
            include_subroles,
        });
        self
    }

    /// Build the registry, rejecting duplicate `(pattern, method)` keys.
    pub fn build(self) -> Result<RouteRegistry, ConfigError> {
        let mut exact = HashMap::with_capacity(self.rules.len());
        for (idx, rule) in self.rules.iter().enumerate() {
            if exact.insert(rule.key(), idx).is_some() {
                return Err(ConfigError::DuplicateRoute {
                    pattern: rule.pattern.clone(),
                    method: rule.method.to_string(),
                });
            }
        }
        Ok(RouteRegistry {
            rules: self.rules,
            exact,
        })
    }
}

impl RouteRegistry {
    pub fn builder() -> RouteRegistryBuilder {
        RouteRegistryBuilder::default()
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up the rule governing `(path, method)`.
    ///
    /// The incoming path is normalized by stripping exactly one trailing
    /// slash. An exact match on the registry key always wins regardless of
    /// registration order; otherwise the first registered pattern that
    /// matches segment-wise and declares the method wins. When two variable
    /// patterns of identical shape both match, first-registered wins — this
    /// tie-break is deliberate and load-bearing, do not replace it with
    /// specificity scoring.
    pub fn lookup(&self, path: &str, method: &Method) -> Option<&RouteRule> {
        let normalized = normalize_path(path);

        if let Some(&idx) = self.exact.get(&(normalized.to_string(), method.clone())) {
            return Some(&self.rules[idx]);
        }

        self.rules
            .iter()
            .find(|rule| rule.method == *method && pattern_matches(&rule.pattern, &normalized))
    }

    /// Verify the registry exactly covers the routes the router exposes.
    ///
    /// Neither direction may differ: a route the router serves without a
    /// registry entry would be unreachable (fail-closed 401), and a registry
    /// entry for a route the router does not serve is dead configuration.
    /// Intended to run at startup, before serving traffic.
    pub fn verify_coverage(&self, exposed: &[(&str, Method)]) -> Result<(), ConfigError> {
        let exposed_keys: Vec<(String, Method)> = exposed
            .iter()
            .map(|(pattern, method)| (normalize_path(pattern).to_string(), method.clone()))
            .collect();

        let missing: Vec<String> = exposed_keys
            .iter()
            .filter(|key| !self.exact.contains_key(*key))
            .map(|(pattern, method)| format!("{} {}", method, pattern))
            .collect();

        let extra: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| !exposed_keys.contains(&rule.key()))
            .map(|rule| format!("{} {}", rule.method, rule.pattern))
            .collect();

        if missing.is_empty() && extra.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::RouteCoverage { missing, extra })
        }
    }
}

/// Strip exactly one trailing slash; the root path is its own normal form.
pub(crate) fn normalize_path(path: &str) -> &str {
    if path.len() > 1 && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Segment-wise pattern match: same segment count, literals equal,
/// `{name}` placeholders match any single segment.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (Some(expected), Some(actual)) => {
                if is_placeholder(expected) {
                    continue;
                }
                if expected != actual {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

fn is_placeholder(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}
